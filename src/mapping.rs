//! Column mapping: which source column backs which transaction field.
//!
//! [`ImportMapping`] is the serialisable record handed to the import step and
//! stored as a named preset. [`ColumnMapper`] owns one while the user is
//! building it and keeps the one-column-one-role invariant: a source column
//! backs at most one destination field or amount sub-role, except that the
//! description may be built from several columns.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{CashmopError, Result};

pub const DEFAULT_CURRENCY: &str = "CAD";
pub const DEFAULT_NEGATIVE_VALUE: &str = "debit";
pub const DEFAULT_POSITIVE_VALUE: &str = "credit";

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_negative_value() -> String {
    DEFAULT_NEGATIVE_VALUE.to_string()
}

fn default_positive_value() -> String {
    DEFAULT_POSITIVE_VALUE.to_string()
}

fn is_false(v: &bool) -> bool {
    !*v
}

// ---------------------------------------------------------------------------
// Amount mapping variants
// ---------------------------------------------------------------------------

/// How a signed amount is derived from one or more source columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AmountMapping {
    #[serde(rename_all = "camelCase")]
    Single {
        #[serde(default)]
        column: String,
        #[serde(default, skip_serializing_if = "is_false")]
        invert_sign: bool,
    },
    /// Net amount is `|credit| - |debit|`.
    #[serde(rename_all = "camelCase")]
    DebitCredit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        debit_column: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credit_column: Option<String>,
        #[serde(default, skip_serializing_if = "is_false")]
        invert_sign: bool,
    },
    /// Sign comes from matching the type column against the two values.
    #[serde(rename_all = "camelCase")]
    AmountWithType {
        #[serde(default)]
        amount_column: String,
        #[serde(default)]
        type_column: String,
        #[serde(default = "default_negative_value")]
        negative_value: String,
        #[serde(default = "default_positive_value")]
        positive_value: String,
        #[serde(default, skip_serializing_if = "is_false")]
        invert_sign: bool,
    },
}

impl Default for AmountMapping {
    fn default() -> Self {
        Self::Single {
            column: String::new(),
            invert_sign: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AmountKind {
    Single,
    DebitCredit,
    AmountWithType,
}

impl AmountKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::DebitCredit => "debitCredit",
            Self::AmountWithType => "amountWithType",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        [Self::Single, Self::DebitCredit, Self::AmountWithType]
            .into_iter()
            .find(|k| k.key().eq_ignore_ascii_case(key))
    }
}

/// Sub-roles a column can take inside an amount mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountRole {
    Column,
    DebitColumn,
    CreditColumn,
    AmountColumn,
    TypeColumn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSide {
    Negative,
    Positive,
}

impl AmountMapping {
    pub fn kind(&self) -> AmountKind {
        match self {
            Self::Single { .. } => AmountKind::Single,
            Self::DebitCredit { .. } => AmountKind::DebitCredit,
            Self::AmountWithType { .. } => AmountKind::AmountWithType,
        }
    }

    pub fn invert_sign(&self) -> bool {
        match self {
            Self::Single { invert_sign, .. }
            | Self::DebitCredit { invert_sign, .. }
            | Self::AmountWithType { invert_sign, .. } => *invert_sign,
        }
    }

    pub fn set_invert_sign(&mut self, value: bool) {
        match self {
            Self::Single { invert_sign, .. }
            | Self::DebitCredit { invert_sign, .. }
            | Self::AmountWithType { invert_sign, .. } => *invert_sign = value,
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Self::Single { column, .. } => !column.trim().is_empty(),
            Self::DebitCredit {
                debit_column,
                credit_column,
                ..
            } => is_set(debit_column) || is_set(credit_column),
            Self::AmountWithType {
                amount_column,
                type_column,
                ..
            } => !amount_column.is_empty() && !type_column.is_empty(),
        }
    }

    /// Columns currently bound, in role order.
    pub fn columns(&self) -> Vec<(AmountRole, &str)> {
        let mut out = Vec::new();
        match self {
            Self::Single { column, .. } => {
                if !column.is_empty() {
                    out.push((AmountRole::Column, column.as_str()));
                }
            }
            Self::DebitCredit {
                debit_column,
                credit_column,
                ..
            } => {
                if let Some(c) = debit_column.as_deref().filter(|c| !c.is_empty()) {
                    out.push((AmountRole::DebitColumn, c));
                }
                if let Some(c) = credit_column.as_deref().filter(|c| !c.is_empty()) {
                    out.push((AmountRole::CreditColumn, c));
                }
            }
            Self::AmountWithType {
                amount_column,
                type_column,
                ..
            } => {
                if !amount_column.is_empty() {
                    out.push((AmountRole::AmountColumn, amount_column.as_str()));
                }
                if !type_column.is_empty() {
                    out.push((AmountRole::TypeColumn, type_column.as_str()));
                }
            }
        }
        out
    }

    pub fn role_of(&self, header: &str) -> Option<AmountRole> {
        self.columns()
            .into_iter()
            .find(|(_, c)| *c == header)
            .map(|(role, _)| role)
    }

    /// Unbind `header` from every sub-role. Returns true when something changed.
    fn clear_column(&mut self, header: &str) -> bool {
        let mut changed = false;
        match self {
            Self::Single { column, .. } => {
                if column == header {
                    column.clear();
                    changed = true;
                }
            }
            Self::DebitCredit {
                debit_column,
                credit_column,
                ..
            } => {
                if debit_column.as_deref() == Some(header) {
                    *debit_column = None;
                    changed = true;
                }
                if credit_column.as_deref() == Some(header) {
                    *credit_column = None;
                    changed = true;
                }
            }
            Self::AmountWithType {
                amount_column,
                type_column,
                ..
            } => {
                if amount_column == header {
                    amount_column.clear();
                    changed = true;
                }
                if type_column == header {
                    type_column.clear();
                    changed = true;
                }
            }
        }
        changed
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// ImportMapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvColumns {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub description: Vec<String>,
    /// Legacy single-column amount, kept in sync with `Single` mappings.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub amount: String,
    #[serde(default)]
    pub amount_mapping: AmountMapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Header snapshot used to recognise the same file layout later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_header: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportMapping {
    #[serde(default)]
    pub csv: CsvColumns,
    #[serde(default)]
    pub account: String,
    #[serde(default, alias = "defaultOwner", skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default = "default_currency")]
    pub currency_default: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MappingMeta>,
}

impl Default for ImportMapping {
    fn default() -> Self {
        Self::new(DEFAULT_CURRENCY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedMapping {
    pub id: i64,
    pub name: String,
    pub mapping: ImportMapping,
}

/// Destination fields a column can be dropped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvField {
    Date,
    Description,
    Amount,
    Owner,
    Account,
    Currency,
}

impl CsvField {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Description => "description",
            Self::Amount => "amount",
            Self::Owner => "owner",
            Self::Account => "account",
            Self::Currency => "currency",
        }
    }
}

/// What a single source column is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Ignore,
    Date,
    Description,
    Money,
    MoneyOut,
    MoneyIn,
    Direction,
    Owner,
    Account,
    Currency,
}

impl ColumnRole {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignore => "Not mapped",
            Self::Date => "Date",
            Self::Description => "Description",
            Self::Money => "Money",
            Self::MoneyOut => "Money out",
            Self::MoneyIn => "Money in",
            Self::Direction => "Direction (in/out)",
            Self::Owner => "Owner",
            Self::Account => "Account",
            Self::Currency => "Currency",
        }
    }
}

impl ImportMapping {
    pub fn new(currency_default: &str) -> Self {
        Self {
            csv: CsvColumns::default(),
            account: String::new(),
            owner: None,
            currency_default: currency_default.to_string(),
            meta: None,
        }
    }

    /// Parse preset JSON, upgrading mappings saved before `amountMapping` existed.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(json)?;
        let has_amount_mapping = raw
            .get("csv")
            .and_then(|csv| csv.get("amountMapping"))
            .is_some();
        let mut mapping: ImportMapping = serde_json::from_value(raw)
            .map_err(|e| CashmopError::InvalidMapping(e.to_string()))?;
        if !has_amount_mapping && !mapping.csv.amount.is_empty() {
            mapping.csv.amount_mapping = AmountMapping::Single {
                column: mapping.csv.amount.clone(),
                invert_sign: false,
            };
        }
        Ok(mapping)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn is_amount_mapping_valid(&self) -> bool {
        self.csv.amount_mapping.is_valid()
    }

    fn has_account(&self) -> bool {
        !self.account.trim().is_empty()
            || self
                .csv
                .account
                .as_deref()
                .is_some_and(|a| !a.trim().is_empty())
    }

    /// Whether a required field still needs a value. Owner and currency are
    /// optional and never missing.
    pub fn is_missing(&self, field: CsvField) -> bool {
        match field {
            CsvField::Date => self.csv.date.trim().is_empty(),
            CsvField::Description => self.csv.description.is_empty(),
            CsvField::Amount => !self.is_amount_mapping_valid(),
            CsvField::Account => !self.has_account(),
            CsvField::Owner | CsvField::Currency => false,
        }
    }

    pub fn missing_fields(&self) -> Vec<CsvField> {
        [
            CsvField::Date,
            CsvField::Description,
            CsvField::Amount,
            CsvField::Account,
        ]
        .into_iter()
        .filter(|f| self.is_missing(*f))
        .collect()
    }

    pub fn can_proceed(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Every source column currently bound to some field.
    pub fn used_headers(&self) -> BTreeSet<String> {
        let csv = &self.csv;
        let mut used = BTreeSet::new();
        for single in [&csv.date, &csv.amount] {
            if !single.is_empty() {
                used.insert(single.clone());
            }
        }
        for opt in [&csv.owner, &csv.account, &csv.currency] {
            if let Some(h) = opt.as_deref().filter(|h| !h.is_empty()) {
                used.insert(h.to_string());
            }
        }
        used.extend(csv.description.iter().cloned());
        for (_, column) in csv.amount_mapping.columns() {
            used.insert(column.to_string());
        }
        used
    }

    /// The file's headers that are bound to something, in file order.
    pub fn mapped_headers(&self, headers: &[String]) -> Vec<String> {
        let used = self.used_headers();
        headers.iter().filter(|h| used.contains(*h)).cloned().collect()
    }

    pub fn header_role(&self, header: &str) -> ColumnRole {
        if header.is_empty() {
            return ColumnRole::Ignore;
        }
        let csv = &self.csv;
        if csv.date == header {
            return ColumnRole::Date;
        }
        if csv.description.iter().any(|d| d == header) {
            return ColumnRole::Description;
        }
        if csv.account.as_deref() == Some(header) {
            return ColumnRole::Account;
        }
        if csv.currency.as_deref() == Some(header) {
            return ColumnRole::Currency;
        }
        if csv.owner.as_deref() == Some(header) {
            return ColumnRole::Owner;
        }
        match csv.amount_mapping.role_of(header) {
            Some(AmountRole::Column | AmountRole::AmountColumn) => ColumnRole::Money,
            Some(AmountRole::DebitColumn) => ColumnRole::MoneyOut,
            Some(AmountRole::CreditColumn) => ColumnRole::MoneyIn,
            Some(AmountRole::TypeColumn) => ColumnRole::Direction,
            None => ColumnRole::Ignore,
        }
    }

    /// One-line guidance for the amount step.
    pub fn amount_hint(&self) -> &'static str {
        const PICK: &str = "Pick the column(s) that contain money.";
        match &self.csv.amount_mapping {
            AmountMapping::Single { column, .. } => {
                if column.is_empty() {
                    PICK
                } else {
                    "Use --invert if income and spending look flipped."
                }
            }
            AmountMapping::DebitCredit {
                debit_column,
                credit_column,
                ..
            } => {
                if !is_set(debit_column) && !is_set(credit_column) {
                    PICK
                } else {
                    "The sign in the file is ignored. Out becomes -, in becomes +."
                }
            }
            AmountMapping::AmountWithType {
                amount_column,
                type_column,
                ..
            } => match (amount_column.is_empty(), type_column.is_empty()) {
                (true, true) => PICK,
                (true, false) => "Pick the money column that pairs with Direction.",
                (false, true) => "Pick the Direction (in/out) column.",
                (false, false) => "Direction decides +/-, the sign in the money column is ignored.",
            },
        }
    }

    /// Unbind `header` from every field and sub-role.
    fn clear_header(&mut self, header: &str) {
        let csv = &mut self.csv;
        if csv.date == header {
            csv.date.clear();
        }
        if csv.amount == header {
            csv.amount.clear();
        }
        for opt in [&mut csv.owner, &mut csv.account, &mut csv.currency] {
            if opt.as_deref() == Some(header) {
                *opt = None;
            }
        }
        csv.description.retain(|h| h != header);
        if csv.amount_mapping.clear_column(header) && csv.amount_mapping.kind() == AmountKind::Single {
            csv.amount.clear();
        }
    }

    /// Collapse half-built variants back to a single column.
    pub fn normalize_amount_mapping(&mut self) {
        let replacement = match &self.csv.amount_mapping {
            AmountMapping::AmountWithType {
                amount_column,
                type_column,
                invert_sign,
                ..
            } if type_column.is_empty() => Some(AmountMapping::Single {
                column: amount_column.clone(),
                invert_sign: *invert_sign,
            }),
            AmountMapping::DebitCredit {
                debit_column,
                credit_column,
                invert_sign,
            } if !is_set(debit_column) && !is_set(credit_column) => Some(AmountMapping::Single {
                column: String::new(),
                invert_sign: *invert_sign,
            }),
            _ => None,
        };
        if let Some(am) = replacement {
            self.csv.amount_mapping = am;
        }
        self.sync_legacy_amount();
    }

    fn sync_legacy_amount(&mut self) {
        if let AmountMapping::Single { column, .. } = &self.csv.amount_mapping {
            self.csv.amount = column.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// ColumnMapper
// ---------------------------------------------------------------------------

/// Mutable session over an [`ImportMapping`].
///
/// Every operation is total: incomplete state is reported through
/// [`ImportMapping::can_proceed`] rather than errors.
#[derive(Debug, Clone, Default)]
pub struct ColumnMapper {
    mapping: ImportMapping,
    /// The amount variant replaced by the most recent kind switch.
    previous_amount: Option<AmountMapping>,
}

impl ColumnMapper {
    pub fn new(mapping: ImportMapping) -> Self {
        Self {
            mapping,
            previous_amount: None,
        }
    }

    pub fn mapping(&self) -> &ImportMapping {
        &self.mapping
    }

    pub fn into_mapping(self) -> ImportMapping {
        self.mapping
    }

    pub fn can_proceed(&self) -> bool {
        self.mapping.can_proceed()
    }

    pub fn is_amount_mapping_valid(&self) -> bool {
        self.mapping.is_amount_mapping_valid()
    }

    pub fn is_missing(&self, field: CsvField) -> bool {
        self.mapping.is_missing(field)
    }

    fn clear_everywhere(&mut self, header: &str) {
        self.mapping.clear_header(header);
        if let Some(prev) = self.previous_amount.as_mut() {
            prev.clear_column(header);
        }
    }

    /// Bind `header` to `field`, revoking any earlier binding of the same column.
    pub fn assign_header_to_field(&mut self, field: CsvField, header: &str) {
        if header.is_empty() {
            return;
        }
        self.clear_everywhere(header);
        let csv = &mut self.mapping.csv;
        let header = header.to_string();
        match field {
            CsvField::Description => csv.description.push(header),
            CsvField::Date => csv.date = header,
            CsvField::Amount => {
                csv.amount = header.clone();
                csv.amount_mapping = AmountMapping::Single {
                    column: header,
                    invert_sign: false,
                };
            }
            CsvField::Owner => csv.owner = Some(header),
            CsvField::Account => csv.account = Some(header),
            CsvField::Currency => csv.currency = Some(header),
        }
    }

    pub fn remove_header_everywhere(&mut self, header: &str) {
        if header.is_empty() {
            return;
        }
        self.clear_everywhere(header);
    }

    /// Move one description column. Out-of-range indices are rejected.
    pub fn reorder_description(&mut self, from: usize, to: usize) -> bool {
        let description = &mut self.mapping.csv.description;
        if from == to || from >= description.len() || to >= description.len() {
            return false;
        }
        let moved = description.remove(from);
        description.insert(to, moved);
        true
    }

    /// Switch the amount variant.
    ///
    /// Switching straight back to the variant that was just replaced restores
    /// it; otherwise a fresh variant is built.
    pub fn set_amount_kind(&mut self, kind: AmountKind) {
        let current = &self.mapping.csv.amount_mapping;
        if current.kind() == kind {
            return;
        }
        let invert_sign = current.invert_sign();
        let restored = self
            .previous_amount
            .take()
            .filter(|prev| prev.kind() == kind);
        let next = restored.unwrap_or_else(|| match kind {
            AmountKind::Single => AmountMapping::Single {
                column: String::new(),
                invert_sign,
            },
            AmountKind::DebitCredit => AmountMapping::DebitCredit {
                debit_column: None,
                credit_column: None,
                invert_sign,
            },
            AmountKind::AmountWithType => AmountMapping::AmountWithType {
                amount_column: String::new(),
                type_column: String::new(),
                negative_value: default_negative_value(),
                positive_value: default_positive_value(),
                invert_sign,
            },
        });
        let replaced = std::mem::replace(&mut self.mapping.csv.amount_mapping, next);
        self.previous_amount = Some(replaced);
        self.mapping.sync_legacy_amount();
    }

    /// Bind `header` to a sub-role of the active amount variant. Roles that
    /// don't exist on the active variant are ignored.
    pub fn assign_amount_column(&mut self, role: AmountRole, header: &str) {
        if header.is_empty() {
            return;
        }
        let applies = matches!(
            (self.mapping.csv.amount_mapping.kind(), role),
            (AmountKind::Single, _)
                | (AmountKind::DebitCredit, AmountRole::DebitColumn | AmountRole::CreditColumn)
                | (AmountKind::AmountWithType, AmountRole::AmountColumn | AmountRole::TypeColumn)
        );
        if !applies {
            return;
        }
        self.clear_everywhere(header);
        let header = header.to_string();
        match &mut self.mapping.csv.amount_mapping {
            AmountMapping::Single { column, .. } => *column = header,
            AmountMapping::DebitCredit {
                debit_column,
                credit_column,
                ..
            } => match role {
                AmountRole::DebitColumn => *debit_column = Some(header),
                _ => *credit_column = Some(header),
            },
            AmountMapping::AmountWithType {
                amount_column,
                type_column,
                ..
            } => match role {
                AmountRole::AmountColumn => *amount_column = header,
                _ => *type_column = header,
            },
        }
        self.mapping.sync_legacy_amount();
    }

    pub fn set_type_value(&mut self, side: ValueSide, value: &str) {
        if value.trim().is_empty() {
            return;
        }
        if let AmountMapping::AmountWithType {
            negative_value,
            positive_value,
            ..
        } = &mut self.mapping.csv.amount_mapping
        {
            match side {
                ValueSide::Negative => *negative_value = value.to_string(),
                ValueSide::Positive => *positive_value = value.to_string(),
            }
        }
    }

    pub fn set_invert_sign(&mut self, invert: bool) {
        self.mapping.csv.amount_mapping.set_invert_sign(invert);
    }

    pub fn set_account(&mut self, account: &str) {
        self.mapping.account = account.trim().to_string();
    }

    pub fn set_owner(&mut self, owner: Option<&str>) {
        self.mapping.owner = owner
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string);
    }

    pub fn set_currency_default(&mut self, code: &str) {
        self.mapping.currency_default = code.trim().to_uppercase();
    }

    /// Give `header` a role from the per-column picker. Money roles switch the
    /// amount variant as needed.
    pub fn apply_role(&mut self, header: &str, role: ColumnRole) {
        if header.is_empty() {
            return;
        }
        let prev = self.mapping.csv.amount_mapping.clone();
        self.clear_everywhere(header);
        let invert_sign = prev.invert_sign();
        let csv = &mut self.mapping.csv;
        let header_owned = header.to_string();

        match role {
            ColumnRole::Ignore => {}
            ColumnRole::Date => csv.date = header_owned,
            ColumnRole::Description => csv.description.push(header_owned),
            ColumnRole::Owner => csv.owner = Some(header_owned),
            ColumnRole::Currency => csv.currency = Some(header_owned),
            ColumnRole::Account => {
                csv.account = Some(header_owned);
                self.mapping.account.clear();
            }
            ColumnRole::Money => {
                csv.amount_mapping = match prev {
                    AmountMapping::AmountWithType {
                        type_column,
                        negative_value,
                        positive_value,
                        ..
                    } if !type_column.is_empty() && type_column != header => {
                        AmountMapping::AmountWithType {
                            amount_column: header_owned,
                            type_column,
                            negative_value,
                            positive_value,
                            invert_sign,
                        }
                    }
                    _ => AmountMapping::Single {
                        column: header_owned,
                        invert_sign,
                    },
                };
            }
            ColumnRole::MoneyOut | ColumnRole::MoneyIn => {
                let (mut debit, mut credit) = match prev {
                    AmountMapping::DebitCredit {
                        debit_column,
                        credit_column,
                        ..
                    } => (debit_column, credit_column),
                    _ => (None, None),
                };
                debit = debit.filter(|d| d != header);
                credit = credit.filter(|c| c != header);
                if role == ColumnRole::MoneyOut {
                    debit = Some(header_owned);
                } else {
                    credit = Some(header_owned);
                }
                csv.amount_mapping = AmountMapping::DebitCredit {
                    debit_column: debit,
                    credit_column: credit,
                    invert_sign,
                };
            }
            ColumnRole::Direction => {
                let (amount_column, negative_value, positive_value) = match prev {
                    AmountMapping::AmountWithType {
                        amount_column,
                        negative_value,
                        positive_value,
                        ..
                    } => (amount_column, negative_value, positive_value),
                    AmountMapping::Single { column, .. } => {
                        (column, default_negative_value(), default_positive_value())
                    }
                    AmountMapping::DebitCredit { .. } => {
                        (String::new(), default_negative_value(), default_positive_value())
                    }
                };
                let amount_column = if amount_column == header {
                    String::new()
                } else {
                    amount_column
                };
                csv.amount_mapping = AmountMapping::AmountWithType {
                    amount_column,
                    type_column: header_owned,
                    negative_value,
                    positive_value,
                    invert_sign,
                };
            }
        }

        if !matches!(
            role,
            ColumnRole::Money | ColumnRole::MoneyOut | ColumnRole::MoneyIn | ColumnRole::Direction
        ) {
            self.mapping.normalize_amount_mapping();
        } else {
            self.mapping.sync_legacy_amount();
        }
    }
}
