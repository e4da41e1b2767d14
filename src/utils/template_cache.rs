use crate::model::email_template::EmailTemplate;
use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::SqlitePool;
use std::time::Duration;

/// Template lookup cache keyed by name. Every merge send resolves its
/// template by name, so hot templates stay in memory.
pub static TEMPLATE_CACHE: Lazy<Cache<String, EmailTemplate>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(1_000)
        .time_to_live(Duration::from_secs(86400)) // 24h TTL
        .build()
});

pub async fn get(pool: &SqlitePool, name: &str) -> Result<Option<EmailTemplate>, sqlx::Error> {
    if let Some(template) = TEMPLATE_CACHE.get(name).await {
        return Ok(Some(template));
    }

    let row = sqlx::query_as::<_, EmailTemplate>(
        "SELECT id, name, subject, body_text, body_html, status FROM email_templates WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    if let Some(template) = &row {
        TEMPLATE_CACHE
            .insert(name.to_string(), template.clone())
            .await;
    }

    Ok(row)
}

/// Drop a stale entry after a template row changes.
pub async fn invalidate(name: &str) {
    TEMPLATE_CACHE.invalidate(name).await;
}

/// Preload active templates at startup (streamed, not one big fetch_all).
pub async fn warmup_template_cache(pool: &SqlitePool) -> Result<()> {
    let mut stream = sqlx::query_as::<_, EmailTemplate>(
        r#"
        SELECT id, name, subject, body_text, body_html, status
        FROM email_templates
        WHERE status = 'Active'
        "#,
    )
    .fetch(pool);

    let mut total_count = 0usize;

    while let Some(row) = stream.next().await {
        let template = row?;
        TEMPLATE_CACHE
            .insert(template.name.clone(), template)
            .await;
        total_count += 1;
    }

    tracing::info!("Template cache warmup complete: {} templates", total_count);

    Ok(())
}
