//! Server state

use std::sync::Arc;

use crate::app::state::Dashboard;

/// Server state shared across handlers
pub struct ServerState {
    pub dashboard: Arc<Dashboard>,
}

impl ServerState {
    pub fn new(dashboard: Arc<Dashboard>) -> Self {
        Self { dashboard }
    }
}
