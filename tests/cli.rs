use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const BANK_CSV: &str = "Date,Description,Amount\n\
2025-01-05,Coffee Shop,-4.50\n\
2025-01-20,Grocery Store,-82.10\n\
2025-02-01,Salary,2500.00\n";

struct Env {
    home: TempDir,
}

impl Env {
    fn new() -> Self {
        let env = Self {
            home: tempfile::tempdir().unwrap(),
        };
        env.cmd()
            .args(["init", "--data-dir"])
            .arg(env.data_dir())
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized"));
        env
    }

    fn data_dir(&self) -> PathBuf {
        self.home.path().join("data")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("cashmop").unwrap();
        cmd.env("HOME", self.home.path())
            .env("APP_ENV", "test")
            .env_remove("CASHMOP_LOG");
        cmd
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.home.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}

fn import(env: &Env, file: &Path) -> Command {
    let mut cmd = env.cmd();
    cmd.arg("import")
        .arg(file)
        .args(["--account", "TD Visa", "--month", "2025-01", "--month", "2025-02"]);
    cmd
}

#[test]
fn test_init_creates_database() {
    let env = Env::new();
    assert!(env.data_dir().join("cashmop.db").exists());
    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions:   0"));
}

#[test]
fn test_detect_guesses_columns() {
    let env = Env::new();
    let file = env.write("bank_2025-02.csv", BANK_CSV);
    env.cmd()
        .arg("detect")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("guessed from headers"))
        .stdout(predicate::str::contains("Still needed: account"))
        .stdout(predicate::str::contains("Suggested name: bank"));
}

#[test]
fn test_months_lists_each_month() {
    let env = Env::new();
    let file = env.write("bank.csv", BANK_CSV);
    env.cmd()
        .arg("months")
        .arg(&file)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"key\": \"2025-01\""))
        .stdout(predicate::str::contains("\"count\": 2"))
        .stdout(predicate::str::contains("\"key\": \"2025-02\""));
}

#[test]
fn test_import_requires_month_when_file_spans_several() {
    let env = Env::new();
    let file = env.write("bank.csv", BANK_CSV);
    env.cmd()
        .arg("import")
        .arg(&file)
        .args(["--account", "TD Visa"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("File contains multiple months (2025-01, 2025-02)"));
}

#[test]
fn test_import_without_account_is_rejected() {
    let env = Env::new();
    let file = env.write("bank.csv", BANK_CSV);
    env.cmd()
        .arg("import")
        .arg(&file)
        .args(["--month", "2025-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing account"));
}

#[test]
fn test_dry_run_writes_nothing() {
    let env = Env::new();
    let file = env.write("bank.csv", BANK_CSV);
    import(&env, &file)
        .args(["--dry-run", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"parsed_count\": 3"))
        .stdout(predicate::str::contains("\"dry_run\": true"));
    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions:   0"));
}

#[test]
fn test_import_then_duplicate_file() {
    let env = Env::new();
    let file = env.write("bank.csv", BANK_CSV);
    import(&env, &file)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 imported, 0 skipped"));
    import(&env, &file)
        .assert()
        .success()
        .stdout(predicate::str::contains("already been imported"));
}

#[test]
fn test_import_single_month() {
    let env = Env::new();
    let file = env.write("bank.csv", BANK_CSV);
    env.cmd()
        .arg("import")
        .arg(&file)
        .args(["--account", "TD Visa", "--month", "2025-02", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"imported_count\": 1"))
        .stdout(predicate::str::contains("\"months\": [\n    \"2025-02\"\n  ]"));
}

#[test]
fn test_saved_mapping_is_reused_by_name() {
    let env = Env::new();
    let file = env.write("bank.csv", BANK_CSV);
    import(&env, &file)
        .args(["--save-mapping", "Bank"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved mapping 'Bank'"));

    env.cmd()
        .args(["mappings", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bank"));
    env.cmd()
        .args(["mappings", "get", "--name", "Bank"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"account\":\"TD Visa\""));

    // Same layout, new content: detection picks the saved mapping.
    let next = env.write("bank_march.csv", "Date,Description,Amount\n2025-03-02,Rent,-1200.00\n");
    env.cmd()
        .arg("import")
        .arg(&next)
        .args(["--mapping", "Bank"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 imported"));

    env.cmd()
        .args(["mappings", "delete", "--name", "Bank"])
        .assert()
        .success();
    env.cmd()
        .arg("import")
        .arg(&next)
        .args(["--mapping", "Bank"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Mapping 'Bank' not found"));
}

#[test]
fn test_rules_categorize_imported_rows() {
    let env = Env::new();
    env.cmd()
        .args(["rules", "add", "coffee", "--category", "Dining"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dining"));
    let file = env.write("bank.csv", BANK_CSV);
    import(&env, &file)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 categorized by rules"));
}

#[test]
fn test_rules_reject_unknown_match_type() {
    let env = Env::new();
    env.cmd()
        .args(["rules", "add", "coffee", "--category", "Dining", "--match-type", "glob"])
        .assert()
        .failure();
}

#[test]
fn test_search_ranks_candidates() {
    let env = Env::new();
    env.cmd()
        .args(["search", "vis", "Cash", "TD Visa", "Visa Infinite"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Visa Infinite\nTD Visa\n"));
}

#[test]
fn test_backup_create_check_restore() {
    let env = Env::new();
    let file = env.write("bank.csv", BANK_CSV);
    import(&env, &file).assert().success();

    let backup = env.home.path().join("snapshot.db");
    env.cmd()
        .args(["backup", "create", "--output"])
        .arg(&backup)
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup saved"));
    env.cmd()
        .args(["backup", "check"])
        .arg(&backup)
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions: 3"));

    let other = env.write("more.csv", "Date,Description,Amount\n2025-04-01,Gym,-40.00\n");
    env.cmd()
        .arg("import")
        .arg(&other)
        .args(["--account", "TD Visa"])
        .assert()
        .success();

    env.cmd()
        .args(["backup", "restore"])
        .arg(&backup)
        .assert()
        .success()
        .stdout(predicate::str::contains("Previous database saved to"));
    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions:   3"));
}

#[test]
fn test_backup_check_rejects_garbage() {
    let env = Env::new();
    let junk = env.write("junk.db", "not a database at all, just some text padding it out");
    env.cmd()
        .args(["backup", "check"])
        .arg(&junk)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid backup"));
}

#[test]
fn test_map_builds_and_saves_mapping() {
    let env = Env::new();
    let file = env.write(
        "split.csv",
        "Posted,Payee,Withdrawn,Deposited\n2025-01-03,Cafe,4.50,\n2025-01-09,Payroll,,1000.00\n",
    );
    env.cmd()
        .arg("map")
        .arg(&file)
        .args(["--debit", "withdrawn", "--credit", "Deposited", "--account", "Chequing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Amount: debitCredit"))
        .stdout(predicate::str::contains("Ready to import."));

    env.cmd()
        .arg("map")
        .arg(&file)
        .args(["--debit", "Withdrawn", "--credit", "Deposited", "--account", "Chequing", "--save", "Split"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved mapping 'Split'"));

    env.cmd()
        .arg("import")
        .arg(&file)
        .args(["--mapping", "Split", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"imported_count\": 2"));
}

#[test]
fn test_map_rejects_unknown_column() {
    let env = Env::new();
    let file = env.write("bank.csv", BANK_CSV);
    env.cmd()
        .arg("map")
        .arg(&file)
        .args(["--date", "Balance"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Column 'Balance' not in bank.csv"));
}

#[test]
fn test_import_legacy_mappings_from_cache() {
    let env = Env::new();
    let config = env.home.path().join(".config").join("cashmop");
    std::fs::create_dir_all(&config).unwrap();
    let cached = serde_json::json!([{
        "id": "old-bank",
        "name": "Old Bank",
        "mapping": {
            "csv": {
                "date": "Date",
                "description": ["Description"],
                "amountMapping": { "type": "single", "column": "Amount" }
            },
            "account": "Old Chequing"
        }
    }]);
    let prefs = serde_json::json!({ "cashflow.savedMappings": cached.to_string() });
    std::fs::write(config.join("prefs.json"), prefs.to_string()).unwrap();

    env.cmd()
        .args(["mappings", "import-legacy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 imported, 0 left in cache"));
    env.cmd()
        .args(["mappings", "get", "--name", "Old Bank"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Old Chequing"));
    env.cmd()
        .args(["mappings", "import-legacy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached mappings"));
}

fn tx_list(env: &Env, extra: &[&str]) -> serde_json::Value {
    let output = env
        .cmd()
        .args(["tx", "list", "--start", "2025-01-01", "--end", "2025-02-28", "--json"])
        .args(extra)
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_tx_list_and_manual_categorize() {
    let env = Env::new();
    let file = env.write("bank.csv", BANK_CSV);
    import(&env, &file).assert().success();

    let listed = tx_list(&env, &[]);
    assert_eq!(listed["count"], 3);
    assert_eq!(listed["transactions"][0]["description"], "Salary");
    assert_eq!(listed["transactions"][0]["amount"], "2500.00");

    let found = tx_list(&env, &["--query", "coffee"]);
    assert_eq!(found["count"], 1);
    let id = found["transactions"][0]["id"].as_i64().unwrap();
    assert_eq!(found["transactions"][0]["category"], "Uncategorized");

    env.cmd()
        .args(["tx", "categorize", "--id"])
        .arg(id.to_string())
        .args(["--category", "Coffee"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Coffee"));
    let found = tx_list(&env, &["--query", "coffee"]);
    assert_eq!(found["transactions"][0]["category"], "Coffee");

    let spending = tx_list(&env, &["--amount-max", "-10", "--sort", "amount", "--order", "asc"]);
    assert_eq!(spending["count"], 1);
    assert_eq!(spending["transactions"][0]["description"], "Grocery Store");

    env.cmd()
        .args(["tx", "categorize", "--id", "999", "--category", "Dining"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Transaction not found"));
}

#[test]
fn test_tx_list_rejects_half_range() {
    let env = Env::new();
    env.cmd()
        .args(["tx", "list", "--start", "2025-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--start requires --end"));
}

#[test]
fn test_categories_create_and_rename() {
    let env = Env::new();
    env.cmd()
        .args(["categories", "create", "--name", "Pets", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"Pets\""));

    let output = env.cmd().args(["categories", "list", "--json"]).output().unwrap();
    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let pets = listed["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "Pets")
        .unwrap()["id"]
        .as_i64()
        .unwrap();

    env.cmd()
        .args(["categories", "rename", "--id"])
        .arg(pets.to_string())
        .args(["--name", "Pet Care"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Renamed category"));
    env.cmd()
        .args(["categories", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pet Care"));
    env.cmd()
        .args(["categories", "rename", "--id"])
        .arg(pets.to_string())
        .args(["--name", "Groceries"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_export_csv() {
    let env = Env::new();
    let file = env.write("bank.csv", BANK_CSV);
    import(&env, &file).assert().success();

    let out = env.home.path().join("january.csv");
    env.cmd()
        .args(["export", "--start", "2025-01-01", "--end", "2025-01-31", "--format", "csv", "--out"])
        .arg(&out)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"count\": 2"));

    let text = std::fs::read_to_string(&out).unwrap();
    let text = text.trim_start_matches('\u{feff}');
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Date,Description,Amount,Currency,Category,Account,Owner");
    assert_eq!(lines[1], "2025-01-05,Coffee Shop,-4.50,CAD,,TD Visa,");
    assert_eq!(lines.len(), 3);

    env.cmd()
        .args(["export", "--start", "2025-06-01", "--end", "2025-06-30"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No transactions found"));
}

#[test]
fn test_export_xlsx_default_path() {
    let env = Env::new();
    let file = env.write("bank.csv", BANK_CSV);
    import(&env, &file).assert().success();

    env.cmd()
        .args(["export", "--start", "2025-02-01", "--end", "2025-02-28", "--format", "xlsx"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 transactions"));
    assert!(env.data_dir().join("exports").join("cashmop_2025-02.xlsx").exists());
}

#[test]
fn test_oversized_amount_cell_does_not_crash() {
    let env = Env::new();
    let file = env.write(
        "whale.csv",
        "Date,Description,Amount\n2025-01-05,Whale,(-99999999999999999999999)\n2025-01-06,Coffee,-4.50\n",
    );
    env.cmd().arg("detect").arg(&file).assert().success();
    env.cmd()
        .arg("import")
        .arg(&file)
        .args(["--account", "TD Visa", "--dry-run", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"parsed_count\": 2"));
}
