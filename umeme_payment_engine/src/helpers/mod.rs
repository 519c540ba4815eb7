mod phone;

pub use phone::{normalize_phone, PhoneFormatError, PhoneNumber};
use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::TradeId;

/// Creates a fresh trade id, e.g. `TRD-4F7K2M9QAZ`. Ids are assigned once per `execute_trade` call and never reused,
/// which is what makes concurrent execution for "the same trade" impossible by construction.
pub fn new_trade_id() -> TradeId {
    let salt: String =
        rand::thread_rng().sample_iter(&Alphanumeric).take(10).map(|c| (c as char).to_ascii_uppercase()).collect();
    TradeId(format!("TRD-{salt}"))
}
