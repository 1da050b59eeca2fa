use comfy_table::{Cell, Table};

use crate::cli::{load_file, open_backend, resolve_mapping};
use crate::detection::{normalize_header, with_meta};
use crate::error::{CashmopError, Result};
use crate::mapping::{AmountKind, AmountRole, ColumnMapper, ColumnRole, CsvField, ImportMapping, ValueSide};
use crate::parser::ParsedFile;
use crate::service::Backend;

#[derive(Debug, Default, clap::Args)]
pub struct MapArgs {
    /// CSV, XLSX or XLS file the mapping is for
    pub file: String,
    /// Mapping to start from: JSON file, saved name, or - for stdin (default: detected)
    #[arg(long)]
    pub mapping: Option<String>,
    /// Give a column a role: COLUMN=ROLE (ignore, date, description, money,
    /// money-out, money-in, direction, owner, account, currency)
    #[arg(long = "role", value_name = "COLUMN=ROLE")]
    pub roles: Vec<String>,
    #[arg(long)]
    pub date: Option<String>,
    /// Description column (repeatable, joined in order)
    #[arg(long = "description")]
    pub descriptions: Vec<String>,
    /// Move a description column: FROM:TO (zero-based positions)
    #[arg(long = "move-description", value_name = "FROM:TO")]
    pub move_description: Vec<String>,
    /// Single signed amount column
    #[arg(long)]
    pub amount: Option<String>,
    /// Amount layout: single, debitCredit or amountWithType
    #[arg(long = "amount-kind")]
    pub amount_kind: Option<String>,
    /// Money-out column (switches to debit/credit)
    #[arg(long)]
    pub debit: Option<String>,
    /// Money-in column (switches to debit/credit)
    #[arg(long)]
    pub credit: Option<String>,
    /// Unsigned amount column (switches to amount + type)
    #[arg(long = "amount-column")]
    pub amount_column: Option<String>,
    /// Direction column (switches to amount + type)
    #[arg(long = "type-column")]
    pub type_column: Option<String>,
    /// Type value meaning money out (default: debit)
    #[arg(long = "negative-value")]
    pub negative_value: Option<String>,
    /// Type value meaning money in (default: credit)
    #[arg(long = "positive-value")]
    pub positive_value: Option<String>,
    /// Flip the sign of every amount
    #[arg(long, conflicts_with = "no_invert")]
    pub invert: bool,
    #[arg(long = "no-invert")]
    pub no_invert: bool,
    #[arg(long = "account-column")]
    pub account_column: Option<String>,
    #[arg(long = "owner-column")]
    pub owner_column: Option<String>,
    #[arg(long = "currency-column")]
    pub currency_column: Option<String>,
    /// Account name used for every row without an account column
    #[arg(long)]
    pub account: Option<String>,
    /// Owner name used for every row without an owner column
    #[arg(long)]
    pub owner: Option<String>,
    /// Currency used when a row has none
    #[arg(long)]
    pub currency: Option<String>,
    /// Unbind a column from every field (repeatable)
    #[arg(long)]
    pub unmap: Vec<String>,
    /// Save the result under this name
    #[arg(long)]
    pub save: Option<String>,
    /// Write the mapping JSON to this path
    #[arg(long)]
    pub output: Option<String>,
}

fn parse_role(raw: &str) -> Option<ColumnRole> {
    let key: String = raw
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .collect::<String>()
        .to_lowercase();
    Some(match key.as_str() {
        "ignore" | "none" => ColumnRole::Ignore,
        "date" => ColumnRole::Date,
        "description" => ColumnRole::Description,
        "money" | "amount" => ColumnRole::Money,
        "moneyout" | "debit" => ColumnRole::MoneyOut,
        "moneyin" | "credit" => ColumnRole::MoneyIn,
        "direction" | "type" => ColumnRole::Direction,
        "owner" => ColumnRole::Owner,
        "account" => ColumnRole::Account,
        "currency" => ColumnRole::Currency,
        _ => return None,
    })
}

/// Match a column name against the file's headers, exactly first and then
/// ignoring case and spacing.
fn resolve_column(file: &ParsedFile, name: &str) -> Result<String> {
    if let Some(h) = file.headers.iter().find(|h| *h == name) {
        return Ok(h.clone());
    }
    let wanted = normalize_header(name);
    file.headers
        .iter()
        .find(|h| normalize_header(h) == wanted)
        .cloned()
        .ok_or_else(|| {
            CashmopError::Other(format!(
                "Column '{name}' not in {} (columns: {})",
                file.file_name,
                file.headers.join(", ")
            ))
        })
}

fn parse_move(raw: &str) -> Result<(usize, usize)> {
    let parsed = raw
        .split_once(':')
        .and_then(|(a, b)| Some((a.trim().parse().ok()?, b.trim().parse().ok()?)));
    parsed.ok_or_else(|| CashmopError::Other(format!("Invalid --move-description '{raw}'. Use FROM:TO.")))
}

/// Apply every edit in a fixed order: roles, field columns, amount layout,
/// constants, removals, description order.
fn apply_edits(file: &ParsedFile, base: ImportMapping, args: &MapArgs) -> Result<ImportMapping> {
    let mut mapper = ColumnMapper::new(base);

    for raw in &args.roles {
        let (name, role) = raw
            .rsplit_once('=')
            .ok_or_else(|| CashmopError::Other(format!("Invalid --role '{raw}'. Use COLUMN=ROLE.")))?;
        let role = parse_role(role)
            .ok_or_else(|| CashmopError::Other(format!("Unknown role '{role}'")))?;
        mapper.apply_role(&resolve_column(file, name)?, role);
    }

    if let Some(date) = &args.date {
        mapper.assign_header_to_field(CsvField::Date, &resolve_column(file, date)?);
    }
    for desc in &args.descriptions {
        mapper.assign_header_to_field(CsvField::Description, &resolve_column(file, desc)?);
    }
    for (field, name) in [
        (CsvField::Account, &args.account_column),
        (CsvField::Owner, &args.owner_column),
        (CsvField::Currency, &args.currency_column),
    ] {
        if let Some(name) = name {
            mapper.assign_header_to_field(field, &resolve_column(file, name)?);
        }
    }

    if let Some(amount) = &args.amount {
        mapper.assign_header_to_field(CsvField::Amount, &resolve_column(file, amount)?);
    }
    if let Some(kind) = &args.amount_kind {
        let kind = AmountKind::from_key(kind)
            .ok_or_else(|| CashmopError::Other(format!("Unknown amount kind '{kind}'")))?;
        mapper.set_amount_kind(kind);
    }
    for (kind, role, name) in [
        (AmountKind::DebitCredit, AmountRole::DebitColumn, &args.debit),
        (AmountKind::DebitCredit, AmountRole::CreditColumn, &args.credit),
        (AmountKind::AmountWithType, AmountRole::AmountColumn, &args.amount_column),
        (AmountKind::AmountWithType, AmountRole::TypeColumn, &args.type_column),
    ] {
        if let Some(name) = name {
            mapper.set_amount_kind(kind);
            mapper.assign_amount_column(role, &resolve_column(file, name)?);
        }
    }
    if let Some(v) = &args.negative_value {
        mapper.set_type_value(ValueSide::Negative, v);
    }
    if let Some(v) = &args.positive_value {
        mapper.set_type_value(ValueSide::Positive, v);
    }
    if args.invert || args.no_invert {
        mapper.set_invert_sign(args.invert);
    }

    if let Some(account) = &args.account {
        mapper.set_account(account);
    }
    if let Some(owner) = &args.owner {
        mapper.set_owner(Some(owner.as_str()));
    }
    if let Some(code) = &args.currency {
        mapper.set_currency_default(code);
    }

    for name in &args.unmap {
        mapper.remove_header_everywhere(&resolve_column(file, name)?);
    }
    for raw in &args.move_description {
        let (from, to) = parse_move(raw)?;
        if from != to && !mapper.reorder_description(from, to) {
            return Err(CashmopError::Other(format!(
                "Cannot move description {from} to {to}: only {} description columns",
                mapper.mapping().csv.description.len()
            )));
        }
    }

    let mut mapping = mapper.into_mapping();
    mapping.normalize_amount_mapping();
    Ok(mapping)
}

pub fn run(args: &MapArgs) -> Result<()> {
    let parsed = load_file(&args.file)?;
    let backend = open_backend()?;
    let (base, source) = resolve_mapping(&backend, &parsed, args.mapping.as_deref())?;
    tracing::debug!(source = %source, "editing mapping");
    let mapping = with_meta(apply_edits(&parsed, base, args)?, &parsed);

    let mut table = Table::new();
    table.set_header(vec!["Column", "Used as"]);
    for header in &parsed.headers {
        table.add_row(vec![Cell::new(header), Cell::new(mapping.header_role(header).label())]);
    }
    println!("Mapping for {}\n{table}", parsed.file_name);
    println!("Amount: {}", mapping.csv.amount_mapping.kind().key());
    if !mapping.account.is_empty() {
        println!("Account: {}", mapping.account);
    }

    let missing: Vec<&str> = mapping.missing_fields().iter().map(|f| f.key()).collect();
    if missing.is_empty() {
        println!("Ready to import.");
    } else {
        println!("Still needed: {}", missing.join(", "));
        println!("{}", mapping.amount_hint());
    }

    let json = mapping.to_json()?;
    if let Some(path) = &args.output {
        std::fs::write(path, format!("{json}\n"))?;
        println!("Wrote {path}");
    }
    if let Some(name) = &args.save {
        if !mapping.can_proceed() {
            return Err(CashmopError::InvalidMapping(format!(
                "cannot save an incomplete mapping (missing {})",
                missing.join(", ")
            )));
        }
        let id = backend.save_column_mapping(name, &mapping)?;
        println!("Saved mapping '{}' (ID {id})", name.trim());
    }
    if args.output.is_none() && args.save.is_none() {
        println!();
        println!("{json}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::AmountMapping;

    fn file() -> ParsedFile {
        let headers = ["Posted", "Payee", "Memo", "Out", "In", "Card"];
        ParsedFile {
            file_name: "bank.csv".into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: vec![vec![
                "2025-01-02".into(),
                "Cafe".into(),
                "latte".into(),
                "4.50".into(),
                "".into(),
                "Visa".into(),
            ]],
            has_header: true,
        }
    }

    fn args() -> MapArgs {
        MapArgs {
            file: "bank.csv".into(),
            ..MapArgs::default()
        }
    }

    #[test]
    fn test_parse_role_aliases() {
        assert_eq!(parse_role("money-out"), Some(ColumnRole::MoneyOut));
        assert_eq!(parse_role("MoneyIn"), Some(ColumnRole::MoneyIn));
        assert_eq!(parse_role("type"), Some(ColumnRole::Direction));
        assert_eq!(parse_role("colour"), None);
    }

    #[test]
    fn test_resolve_column_ignores_case() {
        assert_eq!(resolve_column(&file(), "payee").unwrap(), "Payee");
        assert!(resolve_column(&file(), "Balance").is_err());
    }

    #[test]
    fn test_debit_credit_from_flags() {
        let a = MapArgs {
            date: Some("Posted".into()),
            descriptions: vec!["Payee".into(), "Memo".into()],
            debit: Some("Out".into()),
            credit: Some("In".into()),
            account: Some("TD Visa".into()),
            ..args()
        };
        let m = apply_edits(&file(), ImportMapping::default(), &a).unwrap();
        assert!(m.can_proceed());
        assert_eq!(
            m.csv.amount_mapping,
            AmountMapping::DebitCredit {
                debit_column: Some("Out".into()),
                credit_column: Some("In".into()),
                invert_sign: false,
            }
        );
    }

    #[test]
    fn test_roles_and_move_description() {
        let a = MapArgs {
            roles: vec![
                "Posted=date".into(),
                "Payee=description".into(),
                "Memo=description".into(),
                "Out=money".into(),
                "Card=account".into(),
            ],
            move_description: vec!["1:0".into()],
            ..args()
        };
        let m = apply_edits(&file(), ImportMapping::default(), &a).unwrap();
        assert_eq!(m.csv.description, vec!["Memo", "Payee"]);
        assert_eq!(m.csv.account.as_deref(), Some("Card"));
        assert!(m.can_proceed());
    }

    #[test]
    fn test_unmap_and_bad_move() {
        let a = MapArgs {
            descriptions: vec!["Payee".into()],
            unmap: vec!["Payee".into()],
            ..args()
        };
        let m = apply_edits(&file(), ImportMapping::default(), &a).unwrap();
        assert!(m.csv.description.is_empty());

        let a = MapArgs {
            move_description: vec!["0:3".into()],
            ..args()
        };
        assert!(apply_edits(&file(), ImportMapping::default(), &a).is_err());
    }

    #[test]
    fn test_type_values_and_invert() {
        let a = MapArgs {
            amount_column: Some("Out".into()),
            type_column: Some("Card".into()),
            negative_value: Some("DR".into()),
            positive_value: Some("CR".into()),
            invert: true,
            ..args()
        };
        let m = apply_edits(&file(), ImportMapping::default(), &a).unwrap();
        match m.csv.amount_mapping {
            AmountMapping::AmountWithType {
                amount_column,
                type_column,
                negative_value,
                positive_value,
                invert_sign,
            } => {
                assert_eq!(amount_column, "Out");
                assert_eq!(type_column, "Card");
                assert_eq!(negative_value, "DR");
                assert_eq!(positive_value, "CR");
                assert!(invert_sign);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
