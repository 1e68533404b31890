// 🔁 Import workflow
// upload → (edit mapping)* → (preview)* → execute, with MappingState carried in a SessionStore.
//
// Two producers share this path: manual file uploads and AI-generated catalog JSON.

use crate::config::ImportConfig;
use crate::detect::{detect, Format};
use crate::error::ImportError;
use crate::executor::{execute_import, ImportContext, ImportResult};
use crate::parser::{parse, ParserOptions};
use crate::preview::{build_preview, Preview};
use crate::reconciliation::{CatalogSnapshot, EditOutcome, MappingState};
use crate::store::{new_session_key, CatalogStore, SessionStore, Transactional, WorkoutStore};
use tracing::{info, warn};

/// A freshly created import session
#[derive(Debug, Clone)]
pub struct Upload {
    pub session_key: String,
    pub state: MappingState,
}

pub struct ImportWorkflow<'a, S: ?Sized, K: ?Sized> {
    store: &'a S,
    sessions: &'a K,
    config: &'a ImportConfig,
}

impl<'a, S, K> ImportWorkflow<'a, S, K>
where
    S: CatalogStore + WorkoutStore + Transactional + ?Sized,
    K: SessionStore + ?Sized,
{
    pub fn new(store: &'a S, sessions: &'a K, config: &'a ImportConfig) -> Self {
        ImportWorkflow {
            store,
            sessions,
            config,
        }
    }

    /// Detect, parse and map an uploaded file, then open a session for it.
    ///
    /// `hint` is only consulted when detection fails. Nothing is stored on error.
    pub fn upload(
        &self,
        data: &[u8],
        filename: Option<&str>,
        hint: Option<&str>,
    ) -> Result<Upload, ImportError> {
        self.check_size(data)?;

        let format = match detect(data) {
            Some(format) => format,
            None => {
                let hinted = hint.and_then(Format::from_hint);
                warn!(?filename, hint = ?hint, resolved = ?hinted, "format not detected");
                hinted.ok_or(ImportError::UnknownFormat)?
            }
        };
        info!(?filename, format = format.code(), bytes = data.len(), "upload received");

        self.open_session(format, data, filename)
    }

    /// Import LLM output as a catalog. A surrounding Markdown code fence is removed;
    /// the text is always parsed as CatalogJSON, never as a workout log.
    pub fn upload_generated(&self, text: &str) -> Result<Upload, ImportError> {
        let json = strip_code_fence(text);
        self.check_size(json.as_bytes())?;
        info!(bytes = json.len(), "generated catalog received");

        self.open_session(Format::CatalogJson, json.as_bytes(), None)
    }

    /// Merge mapping edits into the session
    pub fn update_mapping(
        &self,
        session_key: &str,
        edits: &[(String, String)],
    ) -> Result<(MappingState, EditOutcome), ImportError> {
        let mut state = self.load(session_key)?;
        let outcome = state.apply_edits(edits, self.store)?;
        self.sessions.put(session_key, &state)?;
        Ok((state, outcome))
    }

    /// Apply any submitted edits, then compute the dry run
    pub fn preview(
        &self,
        session_key: &str,
        edits: &[(String, String)],
        athlete_id: Option<i64>,
    ) -> Result<Preview, ImportError> {
        let mut state = self.load(session_key)?;
        if !edits.is_empty() {
            state.apply_edits(edits, self.store)?;
            self.sessions.put(session_key, &state)?;
        }
        Ok(build_preview(&state, self.store, athlete_id)?)
    }

    /// Commit the session's mapping. The session is removed only after a successful commit.
    pub fn execute(&self, session_key: &str, ctx: &ImportContext) -> Result<ImportResult, ImportError> {
        let state = self.load(session_key)?;
        let result = execute_import(&state, self.store, ctx)?;
        self.sessions.remove(session_key)?;
        info!(session_key, created = result.total_created(), "import session closed");
        Ok(result)
    }

    /// Drop a session without importing
    pub fn cancel(&self, session_key: &str) -> Result<(), ImportError> {
        self.sessions.remove(session_key)?;
        Ok(())
    }

    fn check_size(&self, data: &[u8]) -> Result<(), ImportError> {
        if data.len() > self.config.max_upload_bytes {
            return Err(ImportError::UploadTooLarge {
                size: data.len(),
                limit: self.config.max_upload_bytes,
            });
        }
        Ok(())
    }

    fn open_session(
        &self,
        format: Format,
        data: &[u8],
        filename: Option<&str>,
    ) -> Result<Upload, ImportError> {
        let options = ParserOptions {
            default_unit: self.config.default_weight_unit,
        };
        let parsed = parse(format, data, &options)?;
        let snapshot = CatalogSnapshot::load(self.store)?;
        let state = MappingState::build(format, parsed, &snapshot, data).with_filename(filename);

        let session_key = new_session_key();
        self.sessions.put(&session_key, &state)?;

        Ok(Upload { session_key, state })
    }

    fn load(&self, session_key: &str) -> Result<MappingState, ImportError> {
        self.sessions
            .get(session_key)?
            .ok_or_else(|| ImportError::SessionNotFound(session_key.to_string()))
    }
}

/// Strip a ```` ```json ... ``` ```` fence around generated JSON, if present
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string ("json") up to the first newline
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

// ============================================================================
// TESTS
// ============================================================================
