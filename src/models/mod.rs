/// Declares a string-backed enum stored in a VARCHAR column.
/// Generates `as_str`, `FromStr`, `Display`, serde and diesel Text conversions.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            serde::Serialize,
            serde::Deserialize,
            diesel::expression::AsExpression,
            diesel::deserialize::FromSqlRow,
        )]
        #[diesel(sql_type = diesel::sql_types::Text)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!(concat!("Invalid ", stringify!($name), ": {}"), s)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::pg::Pg> for $name {
            fn from_sql(bytes: diesel::pg::PgValue<'_>) -> diesel::deserialize::Result<Self> {
                let value =
                    <String as diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::pg::Pg>>::from_sql(bytes)?;
                value.parse::<$name>().map_err(|e| e.into())
            }
        }

        impl diesel::serialize::ToSql<diesel::sql_types::Text, diesel::pg::Pg> for $name {
            fn to_sql<'b>(
                &'b self,
                out: &mut diesel::serialize::Output<'b, '_, diesel::pg::Pg>,
            ) -> diesel::serialize::Result {
                <str as diesel::serialize::ToSql<diesel::sql_types::Text, diesel::pg::Pg>>::to_sql(
                    self.as_str(),
                    out,
                )
            }
        }
    };
}

pub mod amount;
pub mod auth_token;
pub mod event_log;
pub mod login_attempt;
pub mod merchant;
pub mod pagination;
pub mod points_ledger;
pub mod program;
pub mod reward;
pub mod session;
pub mod transaction;
pub mod user;
pub mod verification;

// Re-export common types
pub use amount::{Amount, AmountError};
pub use auth_token::{AuthToken, NewAuthToken};
pub use event_log::{ActorType, EventLog, EventType, NewEventLog};
pub use login_attempt::LoginAttempt;
pub use merchant::{
    Merchant, MerchantCustomer, MerchantStatus, MerchantType, NewMerchant, NewMerchantCustomer,
};
pub use pagination::{PaginatedResponse, Pagination, PaginationQuery};
pub use points_ledger::{NewLedgerEntry, PointsDirection, PointsLedger, PointsMovement};
pub use program::{NewProgram, NewProgramRule, Program, ProgramRule, RuleCondition};
pub use reward::{NewRedemption, NewReward, Redemption, RedemptionStatus, Reward};
pub use session::Session;
pub use transaction::{NewTransaction, Transaction, TransactionStatus, TransactionType};
pub use user::{NewUser, User, UserStatus};
pub use verification::{NewRegistrationVerification, RegistrationVerification};
