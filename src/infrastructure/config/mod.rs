mod settings;

pub use settings::{PersistenceConfig, RoomConfig, ServerConfig, Settings, WebSocketConfig};
