// SPDX-FileCopyrightText: 2026 Lumen Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation history operations.

use std::collections::BTreeMap;

use lumen_core::LumenError;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::{GenerationRecord, HistoryFilter};
use crate::queries::conversion_err;

const RECORD_COLUMNS: &str = "id, prompt, negative_prompt, model, width, height, steps, \
                              cfg_scale, seed, output_path, transparent_path, \
                              generation_time_ms, theme_id, template_id, template_values, \
                              created_at";

fn row_to_record(row: &Row<'_>) -> Result<GenerationRecord, rusqlite::Error> {
    let template_values: Option<String> = row.get(14)?;
    let template_values = template_values
        .map(|json| serde_json::from_str::<BTreeMap<String, String>>(&json))
        .transpose()
        .map_err(|e| conversion_err(14, e))?;
    Ok(GenerationRecord {
        id: row.get(0)?,
        prompt: row.get(1)?,
        negative_prompt: row.get(2)?,
        model: row.get(3)?,
        width: row.get(4)?,
        height: row.get(5)?,
        steps: row.get(6)?,
        cfg_scale: row.get(7)?,
        seed: row.get(8)?,
        output_path: row.get(9)?,
        transparent_path: row.get(10)?,
        generation_time_ms: row.get::<_, i64>(11)?.max(0) as u64,
        theme_id: row.get(12)?,
        template_id: row.get(13)?,
        template_values,
        created_at: row.get(15)?,
    })
}

/// Insert a history record. A duplicate id is a storage error.
pub async fn record(db: &Database, record: &GenerationRecord) -> Result<(), LumenError> {
    let template_values = record
        .template_values
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(LumenError::storage)?;
    let r = record.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                &format!(
                    "INSERT INTO generations ({RECORD_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
                ),
                params![
                    r.id,
                    r.prompt,
                    r.negative_prompt,
                    r.model,
                    r.width,
                    r.height,
                    r.steps,
                    r.cfg_scale,
                    r.seed,
                    r.output_path,
                    r.transparent_path,
                    i64::try_from(r.generation_time_ms).unwrap_or(i64::MAX),
                    r.theme_id,
                    r.template_id,
                    template_values,
                    r.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a record by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<GenerationRecord>, LumenError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<GenerationRecord>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM generations WHERE id = ?1"),
                params![id],
                row_to_record,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// List records matching the filter, newest first.
pub async fn list(
    db: &Database,
    filter: &HistoryFilter,
) -> Result<Vec<GenerationRecord>, LumenError> {
    let theme_id = filter.theme_id.clone();
    let template_id = filter.template_id.clone();
    // SQLite treats a negative LIMIT as "no limit".
    let limit = filter.limit.map_or(-1, i64::from);
    let offset = i64::from(filter.offset.unwrap_or(0));
    db.connection()
        .call(move |conn| -> Result<Vec<GenerationRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM generations
                 WHERE (?1 IS NULL OR theme_id = ?1)
                   AND (?2 IS NULL OR template_id = ?2)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = stmt.query_map(
                params![theme_id, template_id, limit, offset],
                row_to_record,
            )?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Count records matching the filter's facets. Paging fields are ignored.
pub async fn count(db: &Database, filter: &HistoryFilter) -> Result<u64, LumenError> {
    let theme_id = filter.theme_id.clone();
    let template_id = filter.template_id.clone();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM generations
                 WHERE (?1 IS NULL OR theme_id = ?1)
                   AND (?2 IS NULL OR template_id = ?2)",
                params![theme_id, template_id],
                |row| row.get(0),
            )
        })
        .await
        .map(|n| n.max(0) as u64)
        .map_err(map_tr_err)
}

/// Delete a record. External maintenance only; the queue never calls this.
pub async fn delete(db: &Database, id: &str) -> Result<bool, LumenError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            Ok(conn.execute("DELETE FROM generations WHERE id = ?1", params![id])? > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, created_at: &str, theme: Option<&str>, template: Option<&str>) -> GenerationRecord {
        GenerationRecord {
            id: id.to_string(),
            prompt: format!("prompt for {id}"),
            negative_prompt: None,
            model: "m1".into(),
            width: 768,
            height: 512,
            steps: 30,
            cfg_scale: 6.5,
            seed: 42,
            output_path: format!("/out/{id}.png"),
            transparent_path: None,
            generation_time_ms: 1200,
            theme_id: theme.map(str::to_string),
            template_id: template.map(str::to_string),
            template_values: template
                .map(|_| BTreeMap::from([("subject".to_string(), id.to_string())])),
            created_at: created_at.to_string(),
        }
    }

    fn ids(records: &[GenerationRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    async fn seeded() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        let rows = [
            sample("r1", "2026-01-01T00:00:00.000Z", Some("forest"), Some("t1")),
            sample("r2", "2026-01-02T00:00:00.000Z", Some("forest"), None),
            sample("r3", "2026-01-03T00:00:00.000Z", Some("ocean"), Some("t1")),
            sample("r4", "2026-01-04T00:00:00.000Z", None, None),
        ];
        for r in &rows {
            record(&db, r).await.unwrap();
        }
        db
    }

    #[tokio::test]
    async fn record_and_get_round_trip() {
        let db = Database::open_in_memory().await.unwrap();
        let mut r = sample("g1", "2026-03-01T12:00:00.000Z", Some("forest"), Some("t1"));
        r.transparent_path = Some("/out/g1_transparent.png".into());
        r.negative_prompt = Some("blurry".into());
        record(&db, &r).await.unwrap();

        assert_eq!(get(&db, "g1").await.unwrap(), Some(r));
        assert!(get(&db, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_record_is_an_error() {
        let db = Database::open_in_memory().await.unwrap();
        let r = sample("g1", "2026-03-01T12:00:00.000Z", None, None);
        record(&db, &r).await.unwrap();
        assert!(record(&db, &r).await.is_err());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let db = seeded().await;
        let all = list(&db, &HistoryFilter::default()).await.unwrap();
        assert_eq!(ids(&all), vec!["r4", "r3", "r2", "r1"]);
    }

    #[tokio::test]
    async fn list_filters_by_theme_and_template() {
        let db = seeded().await;

        let forest = HistoryFilter {
            theme_id: Some("forest".into()),
            ..Default::default()
        };
        assert_eq!(ids(&list(&db, &forest).await.unwrap()), vec!["r2", "r1"]);
        assert_eq!(count(&db, &forest).await.unwrap(), 2);

        let t1 = HistoryFilter {
            template_id: Some("t1".into()),
            ..Default::default()
        };
        assert_eq!(ids(&list(&db, &t1).await.unwrap()), vec!["r3", "r1"]);

        let both = HistoryFilter {
            theme_id: Some("forest".into()),
            template_id: Some("t1".into()),
            ..Default::default()
        };
        assert_eq!(ids(&list(&db, &both).await.unwrap()), vec!["r1"]);
        assert_eq!(count(&db, &HistoryFilter::default()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn list_pages_with_limit_and_offset() {
        let db = seeded().await;
        let page = HistoryFilter {
            limit: Some(2),
            offset: Some(1),
            ..Default::default()
        };
        assert_eq!(ids(&list(&db, &page).await.unwrap()), vec!["r3", "r2"]);

        let offset_only = HistoryFilter {
            offset: Some(3),
            ..Default::default()
        };
        assert_eq!(ids(&list(&db, &offset_only).await.unwrap()), vec!["r1"]);

        // Paging does not affect counts.
        assert_eq!(count(&db, &page).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let db = seeded().await;
        assert!(delete(&db, "r2").await.unwrap());
        assert!(!delete(&db, "r2").await.unwrap());
        assert_eq!(count(&db, &HistoryFilter::default()).await.unwrap(), 3);
    }
}
