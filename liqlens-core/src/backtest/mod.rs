//! Event-conditional backtest: "when the driver moves by T over W days,
//! what does the target do over the next H days?"

pub mod engine;
pub mod events;
pub mod params;
pub mod stats;

pub use engine::{run_on_panel, BacktestError, BacktestResult, EventRecord, EventStudy, Outcome};
pub use events::{detect_events, eligible_rows, trailing_change, Event};
pub use params::{ClusterPolicy, Direction, EventParams, ParamError, THRESHOLD_EPSILON};
pub use stats::ForwardStats;
