pub mod oracle;
pub mod threat;

pub use oracle::{BattleOracle, BattleOutcome, StrengthOracle};
pub use threat::{EnemyThreat, ReachabilityThreatModel, ThreatModel};
