//! Semantic UI targets the engine interacts with, and their default locator
//! candidates.
//!
//! Candidate lists are ordered most stable first: `data-testid` hooks, then
//! ARIA roles/labels, then visible text, then class names, and finally
//! positional XPath. Templates use `{name}` for the runtime parameter (an
//! item, category, station or restaurant name).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::AutomationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    // Login surface
    LoginEmailInput,
    LoginContinueButton,
    LoginPasswordInput,
    LoginSubmitButton,
    LoginErrorMessage,
    TwoFactorCodeInput,
    TwoFactorSubmitButton,

    // Application shell
    LoadingIndicator,
    MainContent,
    UserMenu,
    RestaurantSwitcher,
    RestaurantSearchInput,
    RestaurantSearchResult,
    RestaurantSearchResultNamed,
    DialogCloseButton,
    ConfirmButton,
    SaveButton,

    // Menus
    MenuSearchInput,
    MenuEntityRow,
    MenuItemRow,
    AddCategoryButton,
    CategoryNameInput,
    AddItemButton,
    ItemNameInput,
    ItemPriceInput,
    ItemDescriptionInput,
    ItemCategorySelect,
    ItemCategoryOption,
    ModifierGroupsTab,
    ModifierGroupOption,
    AddModifierGroupButton,
    AppliedModifierGroup,

    // Kitchen display
    AddStationButton,
    StationNameInput,
    StationTypeSelect,
    StationTypeOption,
    StationExpoToggle,
    StationRow,
    StationRows,
    StationDeleteButton,
    StationRoutingTab,
    RoutingCheckbox,
    RoutingFilterInput,
    RoutingFilterResult,
    RoutingFilterClear,
    RoutingSourceEntry,
    RoutingDropZone,
    KdsTemplateSelect,
    KdsTemplateOption,
    DisplaySettingInput,

    // Printers
    AddPrinterButton,
    PrinterNameInput,
    PrinterAddressInput,
    PrinterPortInput,
    PrinterTypeSelect,
    PrinterModelSelect,
    PrinterOption,
    PrinterRow,
    PrinterRows,
    PrinterDeleteButton,
    PrinterStationCheckbox,
    TestPrintButton,
    TestPrintSuccess,
    PrinterRoutingToggle,
}

impl Target {
    pub const ALL: &'static [Target] = &[
        Target::LoginEmailInput,
        Target::LoginContinueButton,
        Target::LoginPasswordInput,
        Target::LoginSubmitButton,
        Target::LoginErrorMessage,
        Target::TwoFactorCodeInput,
        Target::TwoFactorSubmitButton,
        Target::LoadingIndicator,
        Target::MainContent,
        Target::UserMenu,
        Target::RestaurantSwitcher,
        Target::RestaurantSearchInput,
        Target::RestaurantSearchResult,
        Target::RestaurantSearchResultNamed,
        Target::DialogCloseButton,
        Target::ConfirmButton,
        Target::SaveButton,
        Target::MenuSearchInput,
        Target::MenuEntityRow,
        Target::MenuItemRow,
        Target::AddCategoryButton,
        Target::CategoryNameInput,
        Target::AddItemButton,
        Target::ItemNameInput,
        Target::ItemPriceInput,
        Target::ItemDescriptionInput,
        Target::ItemCategorySelect,
        Target::ItemCategoryOption,
        Target::ModifierGroupsTab,
        Target::ModifierGroupOption,
        Target::AddModifierGroupButton,
        Target::AppliedModifierGroup,
        Target::AddStationButton,
        Target::StationNameInput,
        Target::StationTypeSelect,
        Target::StationTypeOption,
        Target::StationExpoToggle,
        Target::StationRow,
        Target::StationRows,
        Target::StationDeleteButton,
        Target::StationRoutingTab,
        Target::RoutingCheckbox,
        Target::RoutingFilterInput,
        Target::RoutingFilterResult,
        Target::RoutingFilterClear,
        Target::RoutingSourceEntry,
        Target::RoutingDropZone,
        Target::KdsTemplateSelect,
        Target::KdsTemplateOption,
        Target::DisplaySettingInput,
        Target::AddPrinterButton,
        Target::PrinterNameInput,
        Target::PrinterAddressInput,
        Target::PrinterPortInput,
        Target::PrinterTypeSelect,
        Target::PrinterModelSelect,
        Target::PrinterOption,
        Target::PrinterRow,
        Target::PrinterRows,
        Target::PrinterDeleteButton,
        Target::PrinterStationCheckbox,
        Target::TestPrintButton,
        Target::TestPrintSuccess,
        Target::PrinterRoutingToggle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::LoginEmailInput => "login-email-input",
            Target::LoginContinueButton => "login-continue-button",
            Target::LoginPasswordInput => "login-password-input",
            Target::LoginSubmitButton => "login-submit-button",
            Target::LoginErrorMessage => "login-error-message",
            Target::TwoFactorCodeInput => "two-factor-code-input",
            Target::TwoFactorSubmitButton => "two-factor-submit-button",
            Target::LoadingIndicator => "loading-indicator",
            Target::MainContent => "main-content",
            Target::UserMenu => "user-menu",
            Target::RestaurantSwitcher => "restaurant-switcher",
            Target::RestaurantSearchInput => "restaurant-search-input",
            Target::RestaurantSearchResult => "restaurant-search-result",
            Target::RestaurantSearchResultNamed => "restaurant-search-result-named",
            Target::DialogCloseButton => "dialog-close-button",
            Target::ConfirmButton => "confirm-button",
            Target::SaveButton => "save-button",
            Target::MenuSearchInput => "menu-search-input",
            Target::MenuEntityRow => "menu-entity-row",
            Target::MenuItemRow => "menu-item-row",
            Target::AddCategoryButton => "add-category-button",
            Target::CategoryNameInput => "category-name-input",
            Target::AddItemButton => "add-item-button",
            Target::ItemNameInput => "item-name-input",
            Target::ItemPriceInput => "item-price-input",
            Target::ItemDescriptionInput => "item-description-input",
            Target::ItemCategorySelect => "item-category-select",
            Target::ItemCategoryOption => "item-category-option",
            Target::ModifierGroupsTab => "modifier-groups-tab",
            Target::ModifierGroupOption => "modifier-group-option",
            Target::AddModifierGroupButton => "add-modifier-group-button",
            Target::AppliedModifierGroup => "applied-modifier-group",
            Target::AddStationButton => "add-station-button",
            Target::StationNameInput => "station-name-input",
            Target::StationTypeSelect => "station-type-select",
            Target::StationTypeOption => "station-type-option",
            Target::StationExpoToggle => "station-expo-toggle",
            Target::StationRow => "station-row",
            Target::StationRows => "station-rows",
            Target::StationDeleteButton => "station-delete-button",
            Target::StationRoutingTab => "station-routing-tab",
            Target::RoutingCheckbox => "routing-checkbox",
            Target::RoutingFilterInput => "routing-filter-input",
            Target::RoutingFilterResult => "routing-filter-result",
            Target::RoutingFilterClear => "routing-filter-clear",
            Target::RoutingSourceEntry => "routing-source-entry",
            Target::RoutingDropZone => "routing-drop-zone",
            Target::KdsTemplateSelect => "kds-template-select",
            Target::KdsTemplateOption => "kds-template-option",
            Target::DisplaySettingInput => "display-setting-input",
            Target::AddPrinterButton => "add-printer-button",
            Target::PrinterNameInput => "printer-name-input",
            Target::PrinterAddressInput => "printer-address-input",
            Target::PrinterPortInput => "printer-port-input",
            Target::PrinterTypeSelect => "printer-type-select",
            Target::PrinterModelSelect => "printer-model-select",
            Target::PrinterOption => "printer-option",
            Target::PrinterRow => "printer-row",
            Target::PrinterRows => "printer-rows",
            Target::PrinterDeleteButton => "printer-delete-button",
            Target::PrinterStationCheckbox => "printer-station-checkbox",
            Target::TestPrintButton => "test-print-button",
            Target::TestPrintSuccess => "test-print-success",
            Target::PrinterRoutingToggle => "printer-routing-toggle",
        }
    }

    /// Human readable description stored on the locator spec.
    pub fn description(&self) -> &'static str {
        match self {
            Target::LoginEmailInput => "Email / username field on the sign-in form",
            Target::LoginContinueButton => "Continue button between the email and password steps",
            Target::LoginPasswordInput => "Password field on the sign-in form",
            Target::LoginSubmitButton => "Sign-in submit button",
            Target::LoginErrorMessage => "Inline error shown after a rejected sign-in",
            Target::TwoFactorCodeInput => "One-time code field on the verification step",
            Target::TwoFactorSubmitButton => "Verification step submit button",
            Target::LoadingIndicator => "Any spinner or skeleton loader",
            Target::MainContent => "Primary content region of an authenticated page",
            Target::UserMenu => "Account menu, only present when signed in",
            Target::RestaurantSwitcher => "Location switcher in the top navigation",
            Target::RestaurantSearchInput => "Search box inside the location switcher",
            Target::RestaurantSearchResult => "Any entry in the location search results",
            Target::RestaurantSearchResultNamed => "Location search result with a given name",
            Target::DialogCloseButton => "Close control of an open modal",
            Target::ConfirmButton => "Confirm control of a confirmation modal",
            Target::SaveButton => "Primary save button of an editor form",
            Target::MenuSearchInput => "Search box on the menu manager",
            Target::MenuEntityRow => "Menu manager row for a named category or item",
            Target::MenuItemRow => "Any menu item row (structural snapshot)",
            Target::AddCategoryButton => "Create-category action",
            Target::CategoryNameInput => "Category name field",
            Target::AddItemButton => "Create-item action",
            Target::ItemNameInput => "Item name field",
            Target::ItemPriceInput => "Item base price field",
            Target::ItemDescriptionInput => "Item description field",
            Target::ItemCategorySelect => "Category picker on the item editor",
            Target::ItemCategoryOption => "Named option in the category picker",
            Target::ModifierGroupsTab => "Modifier groups tab of the item editor",
            Target::ModifierGroupOption => "Named modifier group in the picker",
            Target::AddModifierGroupButton => "Attach selected modifier group action",
            Target::AppliedModifierGroup => "Modifier group already attached to the item",
            Target::AddStationButton => "Create prep-station action",
            Target::StationNameInput => "Prep station name field",
            Target::StationTypeSelect => "Prep station type picker",
            Target::StationTypeOption => "Named option in the station type picker",
            Target::StationExpoToggle => "Expo station switch",
            Target::StationRow => "Prep station list row with a given name",
            Target::StationRows => "Every row of the prep station list",
            Target::StationDeleteButton => "Delete action on a station row",
            Target::StationRoutingTab => "Routing tab of the station editor",
            Target::RoutingCheckbox => "Routing checkbox for a named item or category",
            Target::RoutingFilterInput => "Filter box of the routing picker",
            Target::RoutingFilterResult => "Filtered routing picker result with a given name",
            Target::RoutingFilterClear => "Clear control of the routing filter",
            Target::RoutingSourceEntry => "Draggable routing source entry with a given name",
            Target::RoutingDropZone => "Drop zone of the station routing board",
            Target::KdsTemplateSelect => "KDS template picker",
            Target::KdsTemplateOption => "Named KDS template option",
            Target::DisplaySettingInput => "Display setting field with a given name",
            Target::AddPrinterButton => "Add-printer action",
            Target::PrinterNameInput => "Printer name field",
            Target::PrinterAddressInput => "Printer IP address field",
            Target::PrinterPortInput => "Printer port field",
            Target::PrinterTypeSelect => "Printer type picker",
            Target::PrinterModelSelect => "Printer model picker",
            Target::PrinterOption => "Named option inside a printer picker",
            Target::PrinterRow => "Printer list row with a given name",
            Target::PrinterRows => "Every row of the printer list",
            Target::PrinterDeleteButton => "Delete action on a printer row",
            Target::PrinterStationCheckbox => "Station assignment checkbox on the printer editor",
            Target::TestPrintButton => "Send test print action",
            Target::TestPrintSuccess => "Confirmation shown after a successful test print",
            Target::PrinterRoutingToggle => "Named printer routing switch",
        }
    }

    /// Targets whose candidates carry a `{name}` placeholder.
    pub fn requires_param(&self) -> bool {
        matches!(
            self,
            Target::RestaurantSearchResultNamed
                | Target::MenuEntityRow
                | Target::ItemCategoryOption
                | Target::ModifierGroupOption
                | Target::AppliedModifierGroup
                | Target::StationTypeOption
                | Target::StationRow
                | Target::StationDeleteButton
                | Target::RoutingCheckbox
                | Target::RoutingFilterResult
                | Target::RoutingSourceEntry
                | Target::RoutingDropZone
                | Target::KdsTemplateOption
                | Target::DisplaySettingInput
                | Target::PrinterOption
                | Target::PrinterRow
                | Target::PrinterDeleteButton
                | Target::PrinterStationCheckbox
                | Target::PrinterRoutingToggle
        )
    }

    /// Default candidates, most stable first.
    pub fn default_locators(&self) -> &'static [&'static str] {
        match self {
            Target::LoginEmailInput => &[
                "testid:login-email",
                "label:Email",
                "placeholder:Email",
                "css:input[type=email]",
                "css:input[name=username]",
            ],
            Target::LoginContinueButton => &[
                "testid:login-continue",
                "role:button|Continue",
                "text:Continue",
                "css:button[name=action][value=default]",
            ],
            Target::LoginPasswordInput => &[
                "testid:login-password",
                "label:Password",
                "placeholder:Password",
                "css:input[type=password]",
            ],
            Target::LoginSubmitButton => &[
                "testid:login-submit",
                "role:button|Log in",
                "role:button|Sign in",
                "text:Log in",
                "css:button[type=submit]",
            ],
            Target::LoginErrorMessage => &[
                "testid:login-error",
                "role:alert",
                "css:.error-message",
                "css:#error-element-password",
            ],
            Target::TwoFactorCodeInput => &[
                "testid:mfa-code",
                "label:Verification code",
                "placeholder:Enter code",
                "css:input[autocomplete=one-time-code]",
                "css:input[name=code]",
            ],
            Target::TwoFactorSubmitButton => &[
                "testid:mfa-submit",
                "role:button|Verify",
                "role:button|Continue",
                "css:button[type=submit]",
            ],
            Target::LoadingIndicator => &[
                "testid:loading-spinner",
                "role:progressbar",
                "css:.spinner",
                "css:.loading",
                "css:.skeleton",
            ],
            Target::MainContent => &[
                "testid:main-content",
                "role:main",
                "css:#main-content",
                "css:main",
            ],
            Target::UserMenu => &[
                "testid:user-menu",
                "role:button|Account",
                "css:.user-menu",
            ],
            Target::RestaurantSwitcher => &[
                "testid:restaurant-switcher",
                "role:button|Switch location",
                "text:Switch location",
                "css:.restaurant-switcher",
            ],
            Target::RestaurantSearchInput => &[
                "testid:restaurant-search",
                "placeholder:Search locations",
                "role:searchbox",
                "css:.restaurant-switcher input",
            ],
            Target::RestaurantSearchResult => &[
                "testid:restaurant-result",
                "role:option",
                "css:.restaurant-switcher li",
            ],
            Target::RestaurantSearchResultNamed => &[
                "testid:restaurant-result-{name}",
                "role:option|{name}",
                "text:{name}",
            ],
            Target::DialogCloseButton => &[
                "testid:modal-close",
                "role:button|Close",
                "css:.modal .close",
                "xpath://div[contains(@class,'modal')]//button[1]",
            ],
            Target::ConfirmButton => &[
                "testid:confirm-button",
                "role:button|Confirm",
                "role:button|Yes",
                "text:Confirm",
            ],
            Target::SaveButton => &[
                "testid:save-button",
                "role:button|Save",
                "text:Save",
                "css:button.btn-primary[type=submit]",
            ],
            Target::MenuSearchInput => &[
                "testid:menu-search",
                "placeholder:Search menus",
                "role:searchbox",
                "css:.menu-manager input[type=search]",
            ],
            Target::MenuEntityRow => &[
                "testid:menu-row-{name}",
                "role:row|{name}",
                "text:{name}",
                "xpath://table//tr[td[normalize-space()='{name}']]",
            ],
            Target::MenuItemRow => &[
                "testid:menu-item-row",
                "role:row",
                "css:.menu-item-row",
                "xpath://table//tbody/tr",
            ],
            Target::AddCategoryButton => &[
                "testid:add-category",
                "role:button|Add category",
                "text:Add category",
                "css:.add-menu-group",
            ],
            Target::CategoryNameInput => &[
                "testid:category-name",
                "label:Category name",
                "placeholder:Category name",
                "css:input[name=groupName]",
            ],
            Target::AddItemButton => &[
                "testid:add-item",
                "role:button|Add item",
                "text:Add item",
                "css:.add-menu-item",
            ],
            Target::ItemNameInput => &[
                "testid:item-name",
                "label:Item name",
                "placeholder:Item name",
                "css:input[name=itemName]",
            ],
            Target::ItemPriceInput => &[
                "testid:item-price",
                "label:Price",
                "placeholder:0.00",
                "css:input[name=price]",
            ],
            Target::ItemDescriptionInput => &[
                "testid:item-description",
                "label:Description",
                "css:textarea[name=description]",
            ],
            Target::ItemCategorySelect => &[
                "testid:item-category",
                "label:Category",
                "role:combobox|Category",
                "css:select[name=menuGroup]",
            ],
            Target::ItemCategoryOption => &[
                "testid:category-option-{name}",
                "role:option|{name}",
                "text:{name}",
            ],
            Target::ModifierGroupsTab => &[
                "testid:modifier-groups-tab",
                "role:tab|Modifier groups",
                "text:Modifier groups",
            ],
            Target::ModifierGroupOption => &[
                "testid:modifier-group-{name}",
                "role:option|{name}",
                "label:{name}",
                "text:{name}",
            ],
            Target::AddModifierGroupButton => &[
                "testid:attach-modifier-group",
                "role:button|Add modifier group",
                "text:Add modifier group",
            ],
            Target::AppliedModifierGroup => &[
                "testid:applied-modifier-{name}",
                "role:listitem|{name}",
                "xpath://ul[contains(@class,'applied-modifiers')]/li[normalize-space()='{name}']",
            ],
            Target::AddStationButton => &[
                "testid:add-station",
                "role:button|Add prep station",
                "text:Add prep station",
                "css:.add-prep-station",
            ],
            Target::StationNameInput => &[
                "testid:station-name",
                "label:Station name",
                "placeholder:Station name",
                "css:input[name=stationName]",
            ],
            Target::StationTypeSelect => &[
                "testid:station-type",
                "label:Station type",
                "css:select[name=stationType]",
            ],
            Target::StationTypeOption => &[
                "testid:station-type-{name}",
                "role:option|{name}",
                "text:{name}",
            ],
            Target::StationExpoToggle => &[
                "testid:station-expo",
                "role:switch|Expo",
                "label:Expo station",
                "css:input[name=isExpo]",
            ],
            Target::StationRows => &[
                "testid:station-row",
                "css:.prep-station-row",
                "xpath://table[contains(@class,'prep-stations')]//tbody/tr",
            ],
            Target::StationRow => &[
                "testid:station-row-{name}",
                "role:row|{name}",
                "text:{name}",
                "xpath://table//tr[td[normalize-space()='{name}']]",
            ],
            Target::StationDeleteButton => &[
                "testid:station-delete-{name}",
                "role:button|Delete {name}",
                "xpath://tr[td[normalize-space()='{name}']]//button[contains(@class,'delete')]",
            ],
            Target::StationRoutingTab => &[
                "testid:station-routing-tab",
                "role:tab|Routing",
                "text:Routing",
            ],
            Target::RoutingCheckbox => &[
                "testid:route-{name}",
                "role:checkbox|{name}",
                "label:{name}",
                "xpath://li[normalize-space()='{name}']//input[@type='checkbox']",
            ],
            Target::RoutingFilterInput => &[
                "testid:routing-filter",
                "placeholder:Filter items",
                "role:searchbox",
                "css:.routing-picker input[type=search]",
            ],
            Target::RoutingFilterResult => &[
                "testid:routing-result-{name}",
                "role:option|{name}",
                "text:{name}",
            ],
            Target::RoutingFilterClear => &[
                "testid:routing-filter-clear",
                "role:button|Clear",
                "css:.routing-picker .clear",
            ],
            Target::RoutingSourceEntry => &[
                "testid:routing-source-{name}",
                "role:listitem|{name}",
                "xpath://ul[contains(@class,'unassigned')]/li[normalize-space()='{name}']",
            ],
            Target::RoutingDropZone => &[
                "testid:routing-drop-{name}",
                "role:region|{name}",
                "css:.routing-board [data-station='{name}']",
            ],
            Target::KdsTemplateSelect => &[
                "testid:kds-template",
                "label:Template",
                "css:select[name=template]",
            ],
            Target::KdsTemplateOption => &[
                "testid:kds-template-{name}",
                "role:option|{name}",
                "text:{name}",
            ],
            Target::DisplaySettingInput => &[
                "testid:display-setting-{name}",
                "label:{name}",
                "css:input[name={name}]",
            ],
            Target::AddPrinterButton => &[
                "testid:add-printer",
                "role:button|Add printer",
                "text:Add printer",
                "css:.add-printer",
            ],
            Target::PrinterNameInput => &[
                "testid:printer-name",
                "label:Printer name",
                "css:input[name=printerName]",
            ],
            Target::PrinterAddressInput => &[
                "testid:printer-address",
                "label:IP address",
                "placeholder:192.168.0.1",
                "css:input[name=ipAddress]",
            ],
            Target::PrinterPortInput => &[
                "testid:printer-port",
                "label:Port",
                "css:input[name=port]",
            ],
            Target::PrinterTypeSelect => &[
                "testid:printer-type",
                "label:Printer type",
                "css:select[name=printerType]",
            ],
            Target::PrinterModelSelect => &[
                "testid:printer-model",
                "label:Model",
                "css:select[name=model]",
            ],
            Target::PrinterOption => &[
                "testid:printer-option-{name}",
                "role:option|{name}",
                "text:{name}",
            ],
            Target::PrinterRows => &[
                "testid:printer-row",
                "css:.printer-row",
                "xpath://table[contains(@class,'printers')]//tbody/tr",
            ],
            Target::PrinterRow => &[
                "testid:printer-row-{name}",
                "role:row|{name}",
                "text:{name}",
                "xpath://table//tr[td[normalize-space()='{name}']]",
            ],
            Target::PrinterDeleteButton => &[
                "testid:printer-delete-{name}",
                "role:button|Delete {name}",
                "xpath://tr[td[normalize-space()='{name}']]//button[contains(@class,'delete')]",
            ],
            Target::PrinterStationCheckbox => &[
                "testid:printer-station-{name}",
                "role:checkbox|{name}",
                "label:{name}",
            ],
            Target::TestPrintButton => &[
                "testid:test-print",
                "role:button|Test print",
                "text:Test print",
            ],
            Target::TestPrintSuccess => &[
                "testid:test-print-success",
                "role:status",
                "text:Test print sent",
            ],
            Target::PrinterRoutingToggle => &[
                "testid:printer-routing-{name}",
                "role:switch|{name}",
                "label:{name}",
            ],
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AutomationError::Validation(format!("Unknown target '{s}'")))
    }
}
