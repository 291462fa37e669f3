use std::sync::Arc;

use cellar_core::{
    ArtifactRegistry, CatalogSource, Config, Downloader, Extractor, OperationController,
};

use crate::api::WsBroadcaster;

/// Controller type the server runs, with the engines behind trait objects.
pub type Controller = OperationController<dyn Downloader, dyn Extractor>;

/// Shared application state
pub struct AppState {
    config: Config,
    controller: Controller,
    catalog: Arc<dyn CatalogSource>,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    pub fn new(
        config: Config,
        controller: Controller,
        catalog: Arc<dyn CatalogSource>,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        Self {
            config,
            controller,
            catalog,
            ws_broadcaster,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        self.controller.registry()
    }

    pub fn catalog(&self) -> &dyn CatalogSource {
        self.catalog.as_ref()
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }
}
