//! Test helpers for proxypool-server integration tests.

use proxypool_core::clock::TradingCalendar;
use proxypool_types::Market;

use crate::state::AppState;

/// Build an in-memory `AppState` over the given markets and calendar, so
/// HTTP-level tests get deterministic `should_start`/`should_stop` behavior
/// instead of depending on the real wall-clock time the test happens to
/// run at.
pub async fn test_app_state(markets: &[Market], calendar: impl TradingCalendar + 'static) -> AppState {
    AppState::in_memory_with_calendar(markets, calendar).await
}
