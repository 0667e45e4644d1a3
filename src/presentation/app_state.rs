// Application state for HTTP handlers
use std::sync::Arc;

use crate::application::alarm_service::AlarmService;
use crate::application::broadcast_service::BroadcastService;
use crate::application::channel_service::ChannelService;
use crate::application::log_service::LogService;
use crate::application::store::TelemetryStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TelemetryStore>,
    pub channels: ChannelService,
    pub logs: LogService,
    pub alarms: AlarmService,
    pub broadcast: BroadcastService,
}
