use std::sync::Arc;
use std::time::Instant;

use crate::chat::{MessagePipeline, PipelineConfig};
use crate::config::Settings;
use crate::connection_manager::{ConnectionManager, RoomTable};
use crate::persistence::MessageStore;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub connection_manager: Arc<ConnectionManager>,
    pub pipeline: Arc<MessagePipeline>,
    pub start_time: Instant,
}

impl AppState {
    /// Build the shared state around an already-selected message store
    pub fn new(settings: Settings, store: Arc<dyn MessageStore>) -> Self {
        let connection_manager = Arc::new(ConnectionManager::with_room_table(
            RoomTable::with_eviction(settings.rooms.evict_empty),
        ));
        let pipeline = Arc::new(MessagePipeline::new(
            connection_manager.clone(),
            store,
            PipelineConfig::from_settings(&settings),
        ));

        Self {
            settings: Arc::new(settings),
            connection_manager,
            pipeline,
            start_time: Instant::now(),
        }
    }
}
