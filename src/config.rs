use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub dir: String,
    pub allowed_types: Vec<String>,
    pub max_file_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub upload: UploadConfig,
}

const DEFAULT_ALLOWED_TYPES: &str = "pdf,doc,docx,txt,ppt,pptx,xls,xlsx";

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            // tokens live 30 days unless overridden
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 30),
        };
        let upload = UploadConfig {
            dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()),
            allowed_types: std::env::var("ALLOWED_FILE_TYPES")
                .unwrap_or_else(|_| DEFAULT_ALLOWED_TYPES.into())
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            max_file_size: std::env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(10 * 1024 * 1024),
        };
        Ok(Self {
            database_url,
            jwt,
            upload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::DEFAULT_ALLOWED_TYPES;

    #[test]
    fn default_allow_list_covers_office_formats() {
        let types: Vec<&str> = DEFAULT_ALLOWED_TYPES.split(',').collect();
        for ext in ["pdf", "docx", "pptx", "xlsx"] {
            assert!(types.contains(&ext), "missing {ext}");
        }
        assert!(!types.contains(&"exe"));
    }
}
