use tracing::{info, instrument};

use super::{PortalEditor, PrinterEditor};
use crate::errors::AutomationError;
use crate::locator::ResolveOptions;
use crate::navigation::Section;
use crate::targets::Target;
use crate::workflow::payload::PrinterSpec;

#[async_trait::async_trait]
impl PrinterEditor for PortalEditor {
    async fn open_printers(&self) -> Result<(), AutomationError> {
        self.navigator
            .open_section(&self.session, Section::Printers)
            .await
            .map(|_| ())
    }

    async fn printer_exists(&self, name: &str) -> Result<bool, AutomationError> {
        self.row_exists(None, Target::PrinterRow, name).await
    }

    #[instrument(skip(self, printer), fields(printer = %printer.name))]
    async fn create_printer(&self, printer: &PrinterSpec) -> Result<(), AutomationError> {
        self.click(Target::AddPrinterButton).await?;
        self.fill(Target::PrinterNameInput, &printer.name).await?;
        self.fill(Target::PrinterAddressInput, &printer.address).await?;
        self.fill(Target::PrinterPortInput, &printer.port.to_string())
            .await?;
        if let Some(kind) = &printer.printer_type {
            self.select(Target::PrinterTypeSelect, Target::PrinterOption, kind)
                .await?;
        }
        if let Some(model) = &printer.model {
            self.select(Target::PrinterModelSelect, Target::PrinterOption, model)
                .await?;
        }
        self.save().await?;
        self.verify_row(None, Target::PrinterRow, &printer.name).await
    }

    async fn clear_printers(&self) -> Result<usize, AutomationError> {
        self.delete_all(Target::PrinterRows, Target::PrinterDeleteButton)
            .await
    }

    async fn assign_station(&self, printer: &str, station: &str) -> Result<(), AutomationError> {
        self.dismiss_dialogs().await;
        self.click_named(Target::PrinterRow, printer).await?;
        self.set_toggle(Target::PrinterStationCheckbox, station, true)
            .await?;
        self.save().await
    }

    async fn test_print(&self, printer: &str) -> Result<(), AutomationError> {
        self.dismiss_dialogs().await;
        self.click_named(Target::PrinterRow, printer).await?;
        self.click(Target::TestPrintButton).await?;
        self.resolver
            .resolve(
                self.session.page(),
                Target::TestPrintSuccess,
                &ResolveOptions::new(self.config.default_timeout()),
            )
            .await
            .map_err(|_| {
                AutomationError::TransientUi(format!("No confirmation of test print on '{printer}'"))
            })?;
        info!("Test print sent to '{}'", printer);
        Ok(())
    }

    async fn set_routing_option(&self, option: &str, enabled: bool) -> Result<(), AutomationError> {
        self.set_toggle(Target::PrinterRoutingToggle, option, enabled)
            .await?;
        self.save().await
    }

    async fn close_dialogs(&self) {
        self.dismiss_dialogs().await
    }
}
