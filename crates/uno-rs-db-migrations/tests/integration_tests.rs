//! Integration tests for the migration engine.
//!
//! These tests write migration sources into temporary directories and run the
//! verbs against real SQLite databases, verifying that:
//! - Apply and revert leave the version table consistent
//! - Sequential file creation and application work end to end
//! - Missing versions are rejected or applied according to policy
//! - `NO TRANSACTION` scripts keep statements that ran before a failure
//! - Native migrations run inside the same transaction as their version row
//! - Settings loaded from TOML drive the executor

use std::path::Path;
use std::sync::Arc;

use uno_rs_core::{settings_loader, UnoError};
use uno_rs_db_backends::{DatabaseBackend, SqliteBackend, Transaction, Value};
use uno_rs_db_migrations::{
    create_migration, Dialect, MemoryFs, MigrationCollector, MigrationConfig, MigrationExecutor,
    MigrationRegistry, NativeMigration, Numbering, OsFs, RunOptions, TemplateKind,
};

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}

fn create_table_script(table: &str) -> String {
    format!(
        "-- +migration Up\nCREATE TABLE {table} (id INTEGER PRIMARY KEY);\n\n-- +migration Down\nDROP TABLE {table};\n"
    )
}

fn executor(dir: &Path, options: RunOptions) -> MigrationExecutor {
    executor_with_registry(dir, options, MigrationRegistry::new())
}

fn executor_with_registry(
    dir: &Path,
    options: RunOptions,
    registry: MigrationRegistry,
) -> MigrationExecutor {
    let config = MigrationConfig::new(Dialect::Sqlite3)
        .with_dir(dir)
        .with_options(options)
        .with_progress_interval(None);
    MigrationExecutor::new(config, Arc::new(OsFs), Arc::new(registry))
}

async fn tables(backend: &SqliteBackend) -> Vec<String> {
    backend
        .query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            &[],
        )
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<String>("name").unwrap())
        .collect()
}

const ALLOW_MISSING: RunOptions = RunOptions {
    allow_missing: true,
    no_versioning: false,
};

// ── 1. Apply then revert leaves no residual row ─────────────────────────

#[tokio::test]
async fn test_apply_then_revert_restores_version_table() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "00001_users.sql", &create_table_script("users"));
    let backend = SqliteBackend::memory().unwrap();
    let exec = executor(tmp.path(), RunOptions::default());

    assert_eq!(exec.version(&backend).await.unwrap(), 0);
    let before = exec.store().records(&backend).await.unwrap();

    exec.up(&backend).await.unwrap();
    assert_eq!(tables(&backend).await, vec!["migrations", "users"]);

    exec.down(&backend).await.unwrap();
    assert_eq!(exec.store().records(&backend).await.unwrap(), before);
    assert_eq!(tables(&backend).await, vec!["migrations"]);
}

// ── 2. Sequential creation then apply ───────────────────────────────────

#[tokio::test]
async fn test_sequential_create_and_apply() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = MigrationRegistry::new();

    let mut created = Vec::new();
    for name in ["create users", "create posts", "add index"] {
        let existing = MigrationCollector::new(&OsFs, &registry)
            .collect(tmp.path())
            .unwrap();
        let path = create_migration(
            tmp.path(),
            name,
            TemplateKind::Sql,
            Numbering::Sequential,
            &existing,
        )
        .unwrap();
        created.push(path.file_name().unwrap().to_string_lossy().into_owned());
    }
    assert_eq!(
        created,
        vec![
            "00001_create_users.sql",
            "00002_create_posts.sql",
            "00003_add_index.sql"
        ]
    );

    let backend = SqliteBackend::memory().unwrap();
    let exec = executor(tmp.path(), RunOptions::default());
    exec.up(&backend).await.unwrap();
    assert_eq!(exec.version(&backend).await.unwrap(), 3);

    exec.down_to(&backend, 1).await.unwrap();
    assert_eq!(exec.version(&backend).await.unwrap(), 1);
}

// ── 3. Missing versions ─────────────────────────────────────────────────

async fn backend_with_gap(dir: &Path) -> SqliteBackend {
    write(dir, "00001_a.sql", &create_table_script("a"));
    write(dir, "00003_c.sql", &create_table_script("c"));
    let backend = SqliteBackend::memory().unwrap();
    executor(dir, RunOptions::default()).up(&backend).await.unwrap();
    write(dir, "00002_b.sql", &create_table_script("b"));
    backend
}

#[tokio::test]
async fn test_missing_version_is_a_conflict() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = backend_with_gap(tmp.path()).await;
    let exec = executor(tmp.path(), RunOptions::default());

    let err = exec.up_to(&backend, 5).await.unwrap_err();
    match err {
        UnoError::VersionConflict { missing } => assert_eq!(missing, vec![2]),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!tables(&backend).await.contains(&"b".to_string()));
}

#[tokio::test]
async fn test_allow_missing_applies_out_of_order() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = backend_with_gap(tmp.path()).await;
    let exec = executor(tmp.path(), ALLOW_MISSING);

    let before: Vec<_> = exec
        .store()
        .records(&backend)
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.version_id != 2)
        .collect();

    exec.up_to(&backend, 5).await.unwrap();

    let after = exec.store().records(&backend).await.unwrap();
    assert_eq!(after.len(), 3);
    assert_eq!(after[0].version_id, 2);
    assert_eq!(after[1..].to_vec(), before);
    assert!(tables(&backend).await.contains(&"b".to_string()));
    assert_eq!(exec.version(&backend).await.unwrap(), 3);
}

// ── 4. NO TRANSACTION ───────────────────────────────────────────────────

#[tokio::test]
async fn test_no_transaction_failure_keeps_earlier_statements() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "00001_notx.sql",
        "-- +migration NO TRANSACTION\n\
         -- +migration Up\n\
         CREATE TABLE first (id INTEGER);\n\
         INSERT INTO missing_table VALUES (1);\n\
         CREATE TABLE third (id INTEGER);\n",
    );
    let backend = SqliteBackend::memory().unwrap();
    let exec = executor(tmp.path(), RunOptions::default());

    let err = exec.up(&backend).await.unwrap_err();
    match &err {
        UnoError::Execution {
            file, statement, ..
        } => {
            assert_eq!(file, "00001_notx.sql");
            assert_eq!(
                statement.as_deref(),
                Some("INSERT INTO missing_table VALUES (1);")
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let names = tables(&backend).await;
    assert!(names.contains(&"first".to_string()));
    assert!(!names.contains(&"third".to_string()));
    assert_eq!(exec.version(&backend).await.unwrap(), 0);
}

// ── 5. Multi-statement blocks ───────────────────────────────────────────

#[tokio::test]
async fn test_statement_block_with_inner_semicolons() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "00001_posts.sql",
        "-- +migration Up\n\
         CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT, edits INTEGER DEFAULT 0);\n\
         \n\
         -- +migration StatementBegin\n\
         CREATE TRIGGER posts_touch AFTER UPDATE OF title ON posts\n\
         BEGIN\n\
         \x20   UPDATE posts SET edits = edits + 1 WHERE id = NEW.id;\n\
         END;\n\
         -- +migration StatementEnd\n\
         \n\
         -- +migration Down\n\
         DROP TRIGGER posts_touch;\n\
         DROP TABLE posts;\n",
    );
    let backend = SqliteBackend::memory().unwrap();
    let exec = executor(tmp.path(), RunOptions::default());
    exec.up(&backend).await.unwrap();

    backend
        .execute("INSERT INTO posts (id, title) VALUES (1, 'a')", &[])
        .await
        .unwrap();
    backend
        .execute(
            "UPDATE posts SET title = ? WHERE id = 1",
            &[Value::from("b")],
        )
        .await
        .unwrap();
    let rows = backend
        .query("SELECT edits FROM posts WHERE id = 1", &[])
        .await
        .unwrap();
    assert_eq!(rows[0].get::<i64>("edits").unwrap(), 1);

    exec.down(&backend).await.unwrap();
    assert_eq!(tables(&backend).await, vec!["migrations"]);
}

// ── 6. Parse errors stop the run before touching the database ───────────

#[tokio::test]
async fn test_parse_error_halts_run() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "00001_a.sql", &create_table_script("a"));
    write(
        tmp.path(),
        "00002_b.sql",
        "-- +migration Up\n-- +migration StatementBegin\nCREATE TABLE b (id INTEGER);\n",
    );
    write(tmp.path(), "00003_c.sql", &create_table_script("c"));
    let backend = SqliteBackend::memory().unwrap();
    let exec = executor(tmp.path(), RunOptions::default());

    let err = exec.up(&backend).await.unwrap_err();
    assert!(matches!(&err, UnoError::ParseError(msg) if msg.starts_with("00002_b.sql")));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(exec.version(&backend).await.unwrap(), 1);
    assert_eq!(tables(&backend).await, vec!["a", "migrations"]);
}

// ── 7. Native migrations ────────────────────────────────────────────────

struct SeedAdmins;

#[async_trait::async_trait]
impl NativeMigration for SeedAdmins {
    async fn up(&self, tx: &Transaction<'_>) -> uno_rs_core::UnoResult<()> {
        tx.execute("CREATE TABLE admins (name TEXT)", &[]).await?;
        tx.execute(
            "INSERT INTO admins (name) VALUES (?)",
            &[Value::from("root")],
        )
        .await?;
        Ok(())
    }

    async fn down(&self, tx: &Transaction<'_>) -> uno_rs_core::UnoResult<()> {
        tx.execute("DROP TABLE admins", &[]).await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_native_migration_between_sql_migrations() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "00001_users.sql", &create_table_script("users"));
    write(tmp.path(), "00002_seed_admins.rs", "// linked into the binary\n");
    write(tmp.path(), "00003_posts.sql", &create_table_script("posts"));

    let mut registry = MigrationRegistry::new();
    registry.register("00002_seed_admins.rs", SeedAdmins).unwrap();
    let backend = SqliteBackend::memory().unwrap();
    let exec = executor_with_registry(tmp.path(), RunOptions::default(), registry);

    exec.up(&backend).await.unwrap();
    assert_eq!(exec.version(&backend).await.unwrap(), 3);
    let rows = backend.query("SELECT name FROM admins", &[]).await.unwrap();
    assert_eq!(rows[0].get::<String>("name").unwrap(), "root");

    exec.down_to(&backend, 1).await.unwrap();
    assert_eq!(tables(&backend).await, vec!["migrations", "users"]);
}

#[tokio::test]
async fn test_unregistered_native_migration_fails() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "00001_users.sql", &create_table_script("users"));
    write(tmp.path(), "00002_orphan.rs", "// never registered\n");
    let backend = SqliteBackend::memory().unwrap();
    let exec = executor(tmp.path(), RunOptions::default());

    let err = exec.up(&backend).await.unwrap_err();
    assert!(matches!(err, UnoError::RegistrationError(_)));
    assert_eq!(exec.version(&backend).await.unwrap(), 1);

    let status = exec.status(&backend).await.unwrap();
    assert_eq!(status.len(), 2);
    assert!(status[0].applied);
    assert!(!status[1].applied);
}

// ── 8. Embedded sources and on-disk databases ───────────────────────────

#[tokio::test]
async fn test_embedded_sources_against_file_database() {
    let tmp = tempfile::tempdir().unwrap();
    let db_path = tmp.path().join("app.db");
    let fs = MemoryFs::new()
        .with_file("migrations/00001_users.sql", create_table_script("users"))
        .with_file("migrations/00002_posts.sql", create_table_script("posts"));
    let config = MigrationConfig::new(Dialect::Sqlite3)
        .with_dir("migrations")
        .with_table("schema_versions")
        .with_progress_interval(None);

    {
        let backend = SqliteBackend::open(&db_path).unwrap();
        let exec = MigrationExecutor::new(
            config.clone(),
            Arc::new(fs.clone()),
            Arc::new(MigrationRegistry::new()),
        );
        exec.up(&backend).await.unwrap();
    }

    let backend = SqliteBackend::open(&db_path).unwrap();
    let exec = MigrationExecutor::new(config, Arc::new(fs), Arc::new(MigrationRegistry::new()));
    assert_eq!(exec.version(&backend).await.unwrap(), 2);
    assert!(tables(&backend).await.contains(&"schema_versions".to_string()));
}

// ── 9. Settings drive the executor ──────────────────────────────────────

#[tokio::test]
async fn test_executor_from_toml_settings() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "00001_users.sql", &create_table_script("users"));

    let toml = format!(
        "driver = \"sqlite\"\ndbstring = \":memory:\"\ndir = {:?}\ntable = \"versions\"\nno_versioning = true\n",
        tmp.path().display().to_string()
    );
    let settings = settings_loader::from_toml_str(&toml).unwrap();
    let config = MigrationConfig::from_settings(&settings).unwrap();
    assert_eq!(config.dialect, Dialect::Sqlite3);

    let backend = uno_rs_db_migrations::connect(&settings.driver, &settings.dbstring)
        .await
        .unwrap();
    let exec = MigrationExecutor::new(config, Arc::new(OsFs), Arc::new(MigrationRegistry::new()));
    exec.up(backend.as_ref()).await.unwrap();

    let rows = backend
        .query(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
            &[],
        )
        .await
        .unwrap();
    let names: Vec<String> = rows
        .iter()
        .map(|r| r.get::<String>("name").unwrap())
        .collect();
    assert_eq!(names, vec!["users"]);
}
