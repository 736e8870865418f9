//! Database layer: pool, migrations, and access for trades, positions, and
//! recommendations.

mod pool;
mod positions;
mod recommendations;
mod trades;

pub use pool::{create_pool_and_migrate, run_migrations};
pub use positions::{PositionRow, list_positions, position_row_to_position, upsert_position};
pub use recommendations::{
    insert_recommendation, list_recommendations, update_recommendation,
};
pub use sqlx::PgPool;
pub use trades::{insert_trade, list_trades, list_trades_for_portfolio};
