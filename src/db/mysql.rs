use secrecy::ExposeSecret;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection, Row};
use tracing::{info, warn};

use super::{CategoryBatch, DbError, Session, TABLE_NAME};
use crate::config::MySqlSettings;

pub struct MySqlSession {
    conn: MySqlConnection,
}

impl MySqlSession {
    pub async fn connect(settings: &MySqlSettings) -> Result<Self, DbError> {
        let conn = MySqlConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(settings.password.expose_secret())
            .database(&settings.database)
            .connect()
            .await?;
        Ok(Self { conn })
    }
}

impl Session for MySqlSession {
    async fn table_exists(&mut self) -> Result<bool, DbError> {
        let row = sqlx::query(
            "SELECT COUNT(*) FROM information_schema.tables
             WHERE table_schema = DATABASE() AND table_name = ?",
        )
        .bind(TABLE_NAME)
        .fetch_one(&mut self.conn)
        .await?;
        let count: i64 = row.try_get(0)?;
        Ok(count > 0)
    }

    async fn create_table(&mut self) -> Result<(), DbError> {
        sqlx::raw_sql(
            "
            CREATE TABLE scraped_data (
                id INT AUTO_INCREMENT PRIMARY KEY,
                category_name VARCHAR(255),
                link TEXT,
                description TEXT
            )
            ",
        )
        .execute(&mut self.conn)
        .await?;
        Ok(())
    }

    async fn insert_batch(
        &mut self,
        batch: &CategoryBatch,
        inserted: &mut usize,
    ) -> Result<(), DbError> {
        // An uncommitted `tx` issues ROLLBACK when dropped.
        let mut tx = self.conn.begin().await?;
        for (name, link, description) in batch.rows() {
            sqlx::query(
                "INSERT INTO scraped_data (category_name, link, description) VALUES (?, ?, ?)",
            )
            .bind(name)
            .bind(link)
            .bind(description)
            .execute(&mut *tx)
            .await?;
            *inserted += 1;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn close(self) {
        match self.conn.close().await {
            Ok(()) => info!("MySQL connection is closed."),
            Err(e) => warn!("Failed to close MySQL connection: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use testcontainers::runners::AsyncRunner;
    use testcontainers::ContainerAsync;
    use testcontainers_modules::mysql::Mysql;

    use super::*;
    use crate::db::{persist, CategoryRecord, PersistOutcome, NOT_AVAILABLE};

    async fn start_mysql() -> (ContainerAsync<Mysql>, MySqlSettings) {
        let container = Mysql::default().start().await.unwrap();
        let settings = MySqlSettings {
            host: container.get_host().await.unwrap().to_string(),
            port: container.get_host_port_ipv4(3306).await.unwrap(),
            user: "root".to_string(),
            password: SecretString::from(String::new()),
            database: "test".to_string(),
        };
        (container, settings)
    }

    fn batch() -> CategoryBatch {
        let mut batch = CategoryBatch::default();
        let rows = [
            ("Governance", "Proposals and votes"),
            ("Grants", NOT_AVAILABLE),
        ];
        for (name, description) in rows {
            batch.push(CategoryRecord {
                name: name.into(),
                link: format!("https://gov.optimism.io/c/{}", name.to_lowercase()),
                description: description.into(),
            });
        }
        batch
    }

    async fn execute(settings: &MySqlSettings, sql: &str) {
        let mut session = MySqlSession::connect(settings).await.unwrap();
        sqlx::raw_sql(sql).execute(&mut session.conn).await.unwrap();
        session.close().await;
    }

    async fn read_rows(settings: &MySqlSettings) -> Vec<(String, String, String)> {
        let mut session = MySqlSession::connect(settings).await.unwrap();
        let rows = sqlx::query(
            "SELECT category_name, link, description FROM scraped_data ORDER BY id",
        )
        .fetch_all(&mut session.conn)
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.get(0), r.get(1), r.get(2)))
        .collect();
        session.close().await;
        rows
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn creates_table_and_inserts_two_rows() {
        let (_container, settings) = start_mysql().await;

        let session = MySqlSession::connect(&settings).await.unwrap();
        let outcome = persist(session, &batch()).await;
        assert!(matches!(
            outcome,
            PersistOutcome::Completed {
                table_created: true,
                inserted: 2
            }
        ));

        assert_eq!(
            read_rows(&settings).await,
            vec![
                (
                    "Governance".to_string(),
                    "https://gov.optimism.io/c/governance".to_string(),
                    "Proposals and votes".to_string()
                ),
                (
                    "Grants".to_string(),
                    "https://gov.optimism.io/c/grants".to_string(),
                    "N/A".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn existing_table_is_not_recreated() {
        let (_container, settings) = start_mysql().await;
        // Extra column proves no CREATE replaced this table.
        execute(
            &settings,
            "CREATE TABLE scraped_data (
                id INT AUTO_INCREMENT PRIMARY KEY,
                category_name VARCHAR(255),
                link TEXT,
                description TEXT,
                note VARCHAR(16) DEFAULT 'kept'
            )",
        )
        .await;

        let session = MySqlSession::connect(&settings).await.unwrap();
        let outcome = persist(session, &batch()).await;
        assert!(matches!(
            outcome,
            PersistOutcome::Completed {
                table_created: false,
                inserted: 2
            }
        ));

        let mut session = MySqlSession::connect(&settings).await.unwrap();
        let notes: Vec<String> = sqlx::query("SELECT note FROM scraped_data")
            .fetch_all(&mut session.conn)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.get(0))
            .collect();
        session.close().await;
        assert_eq!(notes, vec!["kept", "kept"]);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn failed_insert_rolls_back_the_batch() {
        let (_container, settings) = start_mysql().await;
        // The CHECK rejects the second row's sentinel description.
        execute(
            &settings,
            "CREATE TABLE scraped_data (
                id INT AUTO_INCREMENT PRIMARY KEY,
                category_name VARCHAR(255),
                link TEXT,
                description TEXT,
                CHECK (description <> 'N/A')
            )",
        )
        .await;

        let session = MySqlSession::connect(&settings).await.unwrap();
        let outcome = persist(session, &batch()).await;
        match outcome {
            PersistOutcome::Failed {
                inserted_before_failure,
                cause,
            } => {
                assert_eq!(inserted_before_failure, 1);
                assert!(matches!(cause, DbError::MySql(_)));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(read_rows(&settings).await.is_empty());
    }
}
