use tracing::{debug, instrument};

use super::{MenuEditor, PortalEditor};
use crate::errors::AutomationError;
use crate::locator::ResolveOptions;
use crate::navigation::Section;
use crate::targets::Target;
use crate::workflow::payload::{CategorySpec, ItemSpec};

const SEARCH: Option<Target> = Some(Target::MenuSearchInput);

impl PortalEditor {
    /// Open the item's editor on its modifier groups tab.
    async fn open_item_modifiers(&self, item: &str) -> Result<(), AutomationError> {
        self.dismiss_dialogs().await;
        let page = self.session.page();
        if let Err(e) = self
            .resolver
            .fill(page, Target::MenuSearchInput, &ResolveOptions::immediate(), item)
            .await
        {
            debug!("Menu list not filtered: {}", e);
        }
        self.click_named(Target::MenuEntityRow, item).await?;
        self.click(Target::ModifierGroupsTab).await
    }
}

#[async_trait::async_trait]
impl MenuEditor for PortalEditor {
    async fn open_menus(&self) -> Result<(), AutomationError> {
        self.navigator
            .open_section(&self.session, Section::Menus)
            .await
            .map(|_| ())
    }

    async fn category_exists(&self, name: &str) -> Result<bool, AutomationError> {
        self.row_exists(SEARCH, Target::MenuEntityRow, name).await
    }

    #[instrument(skip(self, category), fields(category = %category.name))]
    async fn create_category(&self, category: &CategorySpec) -> Result<(), AutomationError> {
        self.click(Target::AddCategoryButton).await?;
        self.fill(Target::CategoryNameInput, &category.name).await?;
        self.save().await?;
        self.verify_row(SEARCH, Target::MenuEntityRow, &category.name)
            .await
    }

    async fn item_exists(&self, name: &str) -> Result<bool, AutomationError> {
        self.row_exists(SEARCH, Target::MenuEntityRow, name).await
    }

    #[instrument(skip(self, item), fields(item = %item.name))]
    async fn create_item(&self, item: &ItemSpec) -> Result<(), AutomationError> {
        self.click(Target::AddItemButton).await?;
        self.fill(Target::ItemNameInput, &item.name).await?;
        if let Some(price) = item.price {
            self.fill(Target::ItemPriceInput, &format!("{price:.2}"))
                .await?;
        }
        if let Some(description) = &item.description {
            self.fill(Target::ItemDescriptionInput, description).await?;
        }
        if let Some(category) = &item.category {
            self.select(Target::ItemCategorySelect, Target::ItemCategoryOption, category)
                .await?;
        }
        self.save().await?;
        self.verify_row(SEARCH, Target::MenuEntityRow, &item.name)
            .await
    }

    async fn has_modifier_group(&self, item: &str, group: &str) -> Result<bool, AutomationError> {
        self.open_item_modifiers(item).await?;
        Ok(self
            .resolver
            .exists(self.session.page(), Target::AppliedModifierGroup, Some(group))
            .await)
    }

    #[instrument(skip(self))]
    async fn apply_modifier_group(&self, item: &str, group: &str) -> Result<(), AutomationError> {
        let page = self.session.page();
        // The previous item's modifier tab may still be showing.
        self.open_item_modifiers(item).await?;
        self.click(Target::AddModifierGroupButton).await?;
        self.click_named(Target::ModifierGroupOption, group).await?;
        self.save().await?;
        if self
            .resolver
            .exists(page, Target::AppliedModifierGroup, Some(group))
            .await
        {
            Ok(())
        } else {
            Err(AutomationError::TransientUi(format!(
                "Modifier group '{group}' not shown on '{item}' after saving"
            )))
        }
    }

    async fn close_dialogs(&self) {
        self.dismiss_dialogs().await
    }
}
