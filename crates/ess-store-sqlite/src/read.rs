//! Query assembler: candidate selection per strategy, then hydration of each
//! selected file with bounded fan-out. Support search lives here as well since
//! it shares the support hydration.

use ess_core::{
  file::{EvacuationFile, HouseholdMember, NeedsAssessment, Note, Pet},
  query::{EvacuationFilesQuery, FileQueryStrategy, FileSummary, SupportQuery},
  support::{Support, SupportFlag},
};
use futures::{StreamExt as _, TryStreamExt as _, stream};
use rusqlite::{Connection, OptionalExtension as _};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    ASSESSMENT_COLUMNS, FILE_COLUMNS, FILE_SUMMARY_COLUMNS, MEMBER_COLUMNS,
    NOTE_COLUMNS, RawAssessment, RawFile, RawFileSummary, RawMember, RawNote,
    RawSupport, Role, SUPPORT_COLUMNS, encode_dt, encode_uuid, parse_number,
  },
  store::SqliteStore,
};

/// Upper bound on files (and supports) hydrated at once.
pub(crate) const FILE_LOAD_CONCURRENCY: usize = 10;

fn query_summaries(
  conn: &Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<RawFileSummary>> {
  let mut stmt = conn.prepare(sql)?;
  let rows = stmt
    .query_map(params, RawFileSummary::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn query_supports(
  conn: &Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<RawSupport>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {SUPPORT_COLUMNS} FROM supports s
     JOIN evacuation_files f ON f.file_key = s.file_key
     {filter}"
  ))?;
  let rows = stmt
    .query_map(params, RawSupport::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// The non-file criteria of a support search.
fn support_matches(query: &SupportQuery, support: &Support) -> bool {
  query.by_id.as_ref().is_none_or(|id| support.id.as_ref() == Some(id))
    && query
      .by_manual_referral_id
      .as_ref()
      .is_none_or(|r| support.manual_referral_id.as_ref() == Some(r))
    && query.by_status.is_none_or(|s| support.status == s)
}

impl SqliteStore {
  // ── Files ─────────────────────────────────────────────────────────────────

  pub(crate) async fn assemble_files(
    &self,
    query: &EvacuationFilesQuery,
  ) -> Result<Vec<EvacuationFile>> {
    let Some(strategy) = query.strategy() else {
      return Ok(Vec::new());
    };

    let candidates = self.file_candidates(query, strategy).await?;
    let selected = query.refine(candidates);

    let mut files: Vec<EvacuationFile> = stream::iter(selected)
      .map(|summary| self.load_file(summary))
      .buffered(FILE_LOAD_CONCURRENCY)
      .try_collect()
      .await?;

    if query.mask_security_phrase {
      files.iter_mut().for_each(EvacuationFile::mask_security_phrase);
    }
    debug!(?strategy, count = files.len(), "assembled evacuation files");
    Ok(files)
  }

  /// Run the strategy's candidate query. Predicates the SQL applies here are
  /// applied again by [`EvacuationFilesQuery::refine`].
  async fn file_candidates(
    &self,
    query: &EvacuationFilesQuery,
    strategy: FileQueryStrategy,
  ) -> Result<Vec<FileSummary>> {
    let raw = match strategy {
      FileQueryStrategy::ByNeedsAssessment(id) => {
        let id = encode_uuid(id);
        self
          .conn
          .call(move |conn| {
            Ok(query_summaries(
              conn,
              &format!(
                "SELECT {FILE_SUMMARY_COLUMNS}, na.needs_assessment_id
                 FROM needs_assessments na
                 JOIN evacuation_files f ON f.file_key = na.file_key
                 WHERE na.needs_assessment_id = ?1"
              ),
              [id],
            )?)
          })
          .await?
      }
      FileQueryStrategy::ByFile => {
        let number = match &query.file_id {
          Some(id) => match parse_number(id) {
            Some(n) => Some(n),
            None => return Ok(Vec::new()),
          },
          None => None,
        };
        let from = query.registration_date_from.map(encode_dt);
        let to = query.registration_date_to.map(encode_dt);
        self
          .conn
          .call(move |conn| {
            Ok(query_summaries(
              conn,
              &format!(
                "SELECT {FILE_SUMMARY_COLUMNS}, f.current_needs_assessment_id
                 FROM evacuation_files f
                 WHERE f.active = 1
                   AND (?1 IS NULL OR f.file_number = ?1)
                   AND (?2 IS NULL OR f.created_at >= ?2)
                   AND (?3 IS NULL OR f.created_at <= ?3)"
              ),
              rusqlite::params![number, from, to],
            )?)
          })
          .await?
      }
      FileQueryStrategy::ByHouseholdMember => {
        let member = query.household_member_id.map(encode_uuid);
        let linked = query.linked_registrant_id.map(encode_uuid);
        let primary = query.primary_registrant_id.map(encode_uuid);
        self
          .conn
          .call(move |conn| {
            Ok(query_summaries(
              conn,
              &format!(
                "SELECT {FILE_SUMMARY_COLUMNS}, f.current_needs_assessment_id
                 FROM household_members m
                 JOIN member_links l ON l.member_id = m.member_id AND l.role = ?4
                 JOIN evacuation_files f ON f.file_key = l.owner_id
                 WHERE (?1 IS NULL OR m.member_id = ?1)
                   AND (?2 IS NULL OR m.registrant_id = ?2)
                   AND (?3 IS NULL OR (m.registrant_id = ?3
                                       AND m.is_primary_registrant = 1))"
              ),
              rusqlite::params![member, linked, primary, Role::File.as_str()],
            )?)
          })
          .await?
      }
    };

    raw.into_iter().map(RawFileSummary::into_summary).collect()
  }

  /// Load one selected file and everything hanging off it.
  async fn load_file(&self, summary: FileSummary) -> Result<EvacuationFile> {
    let (raw, assessment, members, pets, notes, supports) = tokio::try_join!(
      self.load_file_row(summary.file_key),
      self.load_assessment(summary.needs_assessment_id),
      self.load_members(Role::File, summary.file_key),
      self.load_pets(summary.file_key),
      self.load_notes(summary.file_key),
      self.load_file_supports(summary.file_key),
    )?;

    let mut file = raw.into_file()?;
    file.needs_assessment = assessment;
    file.household_members = members;
    file.pets = pets;
    file.notes = notes;
    file.supports = supports;
    Ok(file)
  }

  async fn load_file_row(&self, file_key: Uuid) -> Result<RawFile> {
    let key = encode_uuid(file_key);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!("SELECT {FILE_COLUMNS} FROM evacuation_files WHERE file_key = ?1"),
          [key],
          RawFile::from_row,
        )?)
      })
      .await?;
    Ok(raw)
  }

  async fn load_assessment(&self, id: Option<Uuid>) -> Result<Option<NeedsAssessment>> {
    let Some(id) = id else {
      return Ok(None);
    };
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {ASSESSMENT_COLUMNS} FROM needs_assessments
                 WHERE needs_assessment_id = ?1"
              ),
              [id_str],
              RawAssessment::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    let Some(raw) = raw else {
      return Ok(None);
    };
    let members = self.load_members(Role::NeedsAssessment, id).await?;
    Ok(Some(raw.into_assessment(members)?))
  }

  /// Members linked to an owner, with names taken from the linked registrant
  /// where there is one.
  async fn load_members(&self, role: Role, owner: Uuid) -> Result<Vec<HouseholdMember>> {
    let owner = encode_uuid(owner);
    let raw: Vec<RawMember> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MEMBER_COLUMNS} FROM member_links l
           JOIN household_members m ON m.member_id = l.member_id
           LEFT JOIN registrants r ON r.registrant_id = m.registrant_id
           WHERE l.role = ?1 AND l.owner_id = ?2
           ORDER BY m.is_primary_registrant DESC, m.last_name, m.first_name"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![role.as_str(), owner], RawMember::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raw.into_iter().map(RawMember::into_member).collect()
  }

  async fn load_pets(&self, file_key: Uuid) -> Result<Vec<Pet>> {
    let key = encode_uuid(file_key);
    let pets = self
      .conn
      .call(move |conn| {
        let mut stmt = conn
          .prepare("SELECT kind, quantity FROM pets WHERE file_key = ?1 ORDER BY rowid")?;
        let rows = stmt
          .query_map([key], |r| Ok(Pet { kind: r.get(0)?, quantity: r.get(1)? }))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(pets)
  }

  async fn load_notes(&self, file_key: Uuid) -> Result<Vec<Note>> {
    let key = encode_uuid(file_key);
    let raw: Vec<RawNote> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NOTE_COLUMNS} FROM notes WHERE file_key = ?1
           ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
          .query_map([key], RawNote::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raw.into_iter().map(RawNote::into_note).collect()
  }

  // ── Supports ──────────────────────────────────────────────────────────────

  async fn load_file_supports(&self, file_key: Uuid) -> Result<Vec<Support>> {
    let key = encode_uuid(file_key);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(query_supports(
          conn,
          "WHERE s.file_key = ?1 ORDER BY s.created_at, s.support_number",
          [key],
        )?)
      })
      .await?;
    self.hydrate_supports(raw).await
  }

  /// Reload supports by key, in the order given.
  pub(crate) async fn supports_by_keys(&self, keys: Vec<Uuid>) -> Result<Vec<Support>> {
    let keys: Vec<String> = keys.into_iter().map(encode_uuid).collect();
    let raw = self
      .conn
      .call(move |conn| {
        let mut rows = Vec::with_capacity(keys.len());
        for key in keys {
          rows.extend(query_supports(conn, "WHERE s.support_key = ?1", [key])?);
        }
        Ok(rows)
      })
      .await?;
    self.hydrate_supports(raw).await
  }

  async fn hydrate_supports(&self, raw: Vec<RawSupport>) -> Result<Vec<Support>> {
    stream::iter(raw)
      .map(|raw| async move {
        let (key, support) = raw.into_support()?;
        self.hydrate_support(key, support).await
      })
      .buffered(FILE_LOAD_CONCURRENCY)
      .try_collect()
      .await
  }

  async fn hydrate_support(&self, key: Uuid, mut support: Support) -> Result<Support> {
    let (members, flags) =
      tokio::try_join!(self.support_member_ids(key), self.support_flags(key))?;
    support.household_member_ids = members;
    support.flags = flags;
    Ok(support)
  }

  async fn support_flags(&self, support_key: Uuid) -> Result<Vec<SupportFlag>> {
    let key = encode_uuid(support_key);
    let details: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT detail FROM support_flags WHERE support_key = ?1
           ORDER BY created_at, rowid",
        )?;
        let rows = stmt
          .query_map([key], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    details
      .iter()
      .map(|d| serde_json::from_str(d).map_err(Error::from))
      .collect()
  }

  pub(crate) async fn find_supports(&self, query: &SupportQuery) -> Result<Vec<Support>> {
    query.validate()?;

    if let Some(file_id) = &query.by_file_id {
      let Some(file) = self.find_file(file_id).await? else {
        return Ok(Vec::new());
      };
      let mut supports = self.load_file_supports(file.file_key).await?;
      supports.retain(|s| support_matches(query, s));
      return Ok(supports);
    }

    let number = match &query.by_id {
      Some(id) => match parse_number(id) {
        Some(n) => Some(n),
        None => return Ok(Vec::new()),
      },
      None => None,
    };
    let referral = query.by_manual_referral_id.clone();
    let status = query.by_status.map(|s| s.as_ref().to_owned());
    // A negative LIMIT means no limit in SQLite.
    let limit = query.limit.and_then(|l| i64::try_from(l).ok()).unwrap_or(-1);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(query_supports(
          conn,
          "WHERE (?1 IS NULL OR s.support_number = ?1)
             AND (?2 IS NULL OR s.manual_referral_id = ?2)
             AND (?3 IS NULL OR s.status = ?3)
           ORDER BY s.created_at, s.support_number
           LIMIT ?4",
          rusqlite::params![number, referral, status, limit],
        )?)
      })
      .await?;

    let supports = self.hydrate_supports(raw).await?;
    debug!(count = supports.len(), "searched supports");
    Ok(supports)
  }
}
