use tracing::instrument;

use super::{KdsEditor, PortalEditor};
use crate::errors::AutomationError;
use crate::navigation::Section;
use crate::routing::{PatternRouting, RoutingOutcome};
use crate::targets::Target;
use crate::workflow::payload::StationSpec;

#[async_trait::async_trait]
impl KdsEditor for PortalEditor {
    async fn open_kds(&self) -> Result<(), AutomationError> {
        self.navigator
            .open_section(&self.session, Section::KitchenDisplay)
            .await
            .map(|_| ())
    }

    async fn station_exists(&self, name: &str) -> Result<bool, AutomationError> {
        self.row_exists(None, Target::StationRow, name).await
    }

    #[instrument(skip(self, station), fields(station = %station.name))]
    async fn create_station(&self, station: &StationSpec) -> Result<(), AutomationError> {
        self.click(Target::AddStationButton).await?;
        self.fill(Target::StationNameInput, &station.name).await?;
        if let Some(kind) = &station.station_type {
            self.select(Target::StationTypeSelect, Target::StationTypeOption, kind)
                .await?;
        }
        if station.is_expo {
            let page = self.session.page();
            let toggle = self
                .resolver
                .resolve(page, Target::StationExpoToggle, &self.options())
                .await?;
            if !page.is_checked(&toggle.element).await? {
                page.click(&toggle.element).await?;
            }
        }
        self.save().await?;
        self.verify_row(None, Target::StationRow, &station.name).await
    }

    async fn clear_stations(&self) -> Result<usize, AutomationError> {
        self.delete_all(Target::StationRows, Target::StationDeleteButton)
            .await
    }

    async fn open_station_routing(&self, station: &str) -> Result<(), AutomationError> {
        self.dismiss_dialogs().await;
        self.click_named(Target::StationRow, station).await?;
        self.click(Target::StationRoutingTab).await
    }

    async fn route_entry(&self, station: &str, entry: &str) -> RoutingOutcome {
        self.routing
            .add_item_to_station(self.session.page(), entry, station)
            .await
    }

    async fn route_patterns(
        &self,
        station: &str,
        patterns: &[String],
    ) -> Result<PatternRouting, AutomationError> {
        self.routing
            .route_by_patterns(self.session.page(), patterns, station)
            .await
    }

    async fn save_routing(&self, _station: &str) -> Result<(), AutomationError> {
        self.save().await
    }

    async fn apply_template(&self, template: &str) -> Result<(), AutomationError> {
        self.select(Target::KdsTemplateSelect, Target::KdsTemplateOption, template)
            .await?;
        self.save().await
    }

    async fn apply_display_setting(&self, name: &str, value: &str) -> Result<(), AutomationError> {
        self.resolver
            .fill(self.session.page(), Target::DisplaySettingInput, &self.named(name), value)
            .await?;
        self.save().await
    }

    async fn close_dialogs(&self) {
        self.dismiss_dialogs().await
    }
}
