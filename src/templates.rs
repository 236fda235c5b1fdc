use dashmap::DashMap;
use notify::{
    event::{EventKind, ModifyKind},
    RecursiveMode, Watcher,
};
use notify_debouncer_full::{new_debouncer, DebounceEventResult};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::error::{AppError, Result};

pub type TemplateCache = Arc<DashMap<String, String>>;

pub const CUSTOMER_LEAD_TEMPLATE: &str = "customer_lead.html";

const TEMPLATE_FILES: &[&str] = &[CUSTOMER_LEAD_TEMPLATE];

/// Loads every e-mail template under `dir`. A missing file fails startup.
pub fn load_templates(dir: &Path) -> io::Result<TemplateCache> {
    let cache: TemplateCache = Arc::new(DashMap::new());

    for filename in TEMPLATE_FILES {
        let path = dir.join(filename);
        match fs::read_to_string(&path) {
            Ok(content) => {
                cache.insert(filename.to_string(), content);
                tracing::info!("Loaded template: {}", path.display());
            }
            Err(e) => {
                tracing::error!("Failed to load template {}: {}", path.display(), e);
                return Err(io::Error::new(
                    e.kind(),
                    format!("Failed to load essential template: {}", path.display()),
                ));
            }
        }
    }
    Ok(cache)
}

/// Reloads edited templates into the cache. Never returns while the watcher is healthy.
pub async fn watch_templates(cache: TemplateCache, dir: PathBuf) -> notify::Result<()> {
    let template_path = if dir.is_absolute() {
        dir
    } else {
        std::env::current_dir()?.join(dir)
    };
    let watched = template_path.clone();

    let event_handler = move |res: DebounceEventResult| match res {
        Ok(events) => {
            for event in events {
                if !matches!(
                    event.kind,
                    EventKind::Modify(ModifyKind::Data(_)) | EventKind::Create(_)
                ) {
                    continue;
                }
                for path in &event.paths {
                    if !path.starts_with(&watched) || !path.is_file() {
                        continue;
                    }
                    let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    if !TEMPLATE_FILES.contains(&filename) {
                        continue;
                    }
                    match fs::read_to_string(path) {
                        Ok(new_content) => {
                            cache.insert(filename.to_string(), new_content);
                            tracing::info!("Reloaded template: {}", path.display());
                        }
                        Err(e) => {
                            tracing::error!("Failed to reload template {}: {}", path.display(), e)
                        }
                    }
                }
            }
        }
        Err(errors) => {
            for error in errors {
                tracing::error!("File watching error: {:?}", error);
            }
        }
    };

    let mut debouncer = new_debouncer(Duration::from_secs(1), None, event_handler)?;
    debouncer
        .watcher()
        .watch(&template_path, RecursiveMode::Recursive)?;
    debouncer
        .cache()
        .add_root(&template_path, RecursiveMode::Recursive);

    tracing::info!("Template watcher started for directory: {}", template_path.display());

    loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
}

pub fn get_template_content(cache: &TemplateCache, filename: &str) -> Result<String> {
    match cache.get(filename) {
        Some(content) => Ok(content.value().clone()),
        None => {
            tracing::error!("Template not found in cache: {}", filename);
            Err(AppError::Internal(format!("Template {} not found", filename)))
        }
    }
}

/// Fills `{{key}}` placeholders. Values are HTML-escaped; unknown placeholders stay as written.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |html, (key, value)| {
        html.replace(&format!("{{{{{}}}}}", key), &ammonia::clean_text(value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_fills_and_escapes() {
        let html = render(
            "<p>{{name}} wants {{program}}</p>",
            &[("name", "<b>Ada</b>"), ("program", "Gut&Digestion")],
        );
        assert!(!html.contains("<b>"));
        assert!(html.contains("&lt;b&gt;Ada"));
        assert!(html.contains("Gut&amp;Digestion"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn render_leaves_unknown_placeholders() {
        assert_eq!(render("{{missing}}", &[("name", "x")]), "{{missing}}");
    }

    #[test]
    fn load_fails_without_template_dir() {
        let dir = std::env::temp_dir().join("plantbased-no-templates-here");
        assert!(load_templates(&dir).is_err());
    }

    #[test]
    fn load_reads_lead_template() {
        let dir = std::env::temp_dir().join(format!("plantbased-templates-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(CUSTOMER_LEAD_TEMPLATE), "<p>{{full_name}}</p>").unwrap();

        let cache = load_templates(&dir).unwrap();
        assert_eq!(
            get_template_content(&cache, CUSTOMER_LEAD_TEMPLATE).unwrap(),
            "<p>{{full_name}}</p>"
        );
        assert!(get_template_content(&cache, "other.html").is_err());
        fs::remove_dir_all(&dir).unwrap();
    }
}
