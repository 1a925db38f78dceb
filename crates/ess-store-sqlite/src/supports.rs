//! Support lifecycle: batch save, status changes, approval submission and the
//! approval queue.

use chrono::Utc;
use ess_core::{
  store::QueueAssignment,
  support::{
    MemberDiff, Queue, QueueItem, SUPPORT_OBJECT_TYPE_CODE, Support, SupportFlag,
    SupportMethod, SupportStatus, SupportStatusChange, initial_status,
    plan_status_change,
  },
};
use rusqlite::OptionalExtension as _;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{Role, decode_dt, decode_enum, decode_uuid, encode_dt, encode_uuid, parse_number},
  files::{NUMBER_BASE, link_member},
  store::{SqliteStore, lookup},
};

/// The internal key of a support and the facts the lifecycle policy needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SupportRef {
  pub support_key: Uuid,
  pub file_key:    Uuid,
  pub method:      SupportMethod,
}

/// The columns a save writes. Status is set on create only.
struct SupportRow {
  category:           String,
  method:             String,
  valid_from:         String,
  valid_to:           String,
  amount_cents:       Option<i64>,
  supplier_id:        Option<String>,
  payee_id:           Option<String>,
  group_lodging_city: Option<String>,
  issued_by_id:       Option<String>,
  manual_referral_id: Option<String>,
}

impl SupportRow {
  fn new(support: &Support) -> Self {
    Self {
      category:           support.category.as_ref().to_owned(),
      method:             support.method.as_ref().to_owned(),
      valid_from:         encode_dt(support.valid_from),
      valid_to:           encode_dt(support.valid_to),
      amount_cents:       support.amount_cents,
      supplier_id:        support.supplier_id.map(encode_uuid),
      payee_id:           support.payee_id.map(encode_uuid),
      group_lodging_city: support.group_lodging_city.clone(),
      issued_by_id:       support.issued_by_id.map(encode_uuid),
      manual_referral_id: support.manual_referral_id.clone(),
    }
  }
}

/// One support of a save batch, after validation.
enum PlannedWrite {
  Create {
    support_key: String,
    status:      String,
    row:         SupportRow,
    members:     Vec<String>,
  },
  Update {
    support_key: String,
    row:         SupportRow,
    added:       Vec<String>,
    removed:     Vec<String>,
  },
}

/// An approval flag encoded for `support_flags`.
struct FlagRow {
  flag_id:          String,
  kind:             &'static str,
  duplicate_of_key: Option<String>,
  detail:           String,
}

fn queue_for_id(id: Uuid) -> Result<Queue> {
  [Queue::Approval, Queue::Review]
    .into_iter()
    .find(|q| q.id() == id)
    .ok_or_else(|| Error::Decode { what: "queue id", value: id.to_string() })
}

impl SqliteStore {
  /// Look up a support by its human-readable number.
  pub(crate) async fn find_support(&self, support_id: &str) -> Result<Option<SupportRef>> {
    let Some(number) = parse_number(support_id) else {
      return Ok(None);
    };

    let raw: Option<(String, String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT support_key, file_key, method FROM supports
               WHERE support_number = ?1",
              [number],
              |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(key, file_key, method)| {
        Ok(SupportRef {
          support_key: decode_uuid(&key)?,
          file_key:    decode_uuid(&file_key)?,
          method:      decode_enum("support method", &method)?,
        })
      })
      .transpose()
  }

  pub(crate) async fn require_support(&self, support_id: &str) -> Result<SupportRef> {
    self
      .find_support(support_id)
      .await?
      .ok_or_else(|| ess_core::Error::not_found("support", support_id).into())
  }

  /// Ids of the household members currently linked to a support.
  pub(crate) async fn support_member_ids(&self, support_key: Uuid) -> Result<Vec<Uuid>> {
    let key_str = encode_uuid(support_key);
    let raw: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT member_id FROM member_links
           WHERE role = ?1 AND owner_id = ?2 ORDER BY member_id",
        )?;
        let ids = stmt
          .query_map(rusqlite::params![Role::Support.as_str(), key_str], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
      })
      .await?;
    raw.iter().map(|s| decode_uuid(s)).collect()
  }

  /// Resolve the references a support saved under `file_key` makes.
  async fn resolve_support_references(&self, support: &Support, file_key: Uuid) -> Result<()> {
    if let Some(issuer) = support.issued_by_id {
      self
        .require(lookup::TEAM_MEMBER, "team member", encode_uuid(issuer))
        .await?;
    }
    if let Some(supplier) = support.supplier_id {
      self
        .require(lookup::ACTIVE_SUPPLIER, "supplier", encode_uuid(supplier))
        .await?;
    }
    if let Some(payee) = support.payee_id {
      self
        .require(lookup::ACTIVE_REGISTRANT, "registrant", encode_uuid(payee))
        .await?;
    }
    let file_key = encode_uuid(file_key);
    for member in &support.household_member_ids {
      let member = encode_uuid(*member);
      if !self
        .exists(lookup::MEMBER_OF_FILE, [member.clone(), file_key.clone()])
        .await?
      {
        return Err(ess_core::Error::not_found("household member", member).into());
      }
    }
    Ok(())
  }

  // ── Save ──────────────────────────────────────────────────────────────────

  pub(crate) async fn write_supports(
    &self,
    file_id: String,
    supports: Vec<Support>,
  ) -> Result<Vec<Support>> {
    let file = self.require_file(&file_id).await?;
    let Some(assessment) = file.current_assessment else {
      return Err(
        ess_core::Error::InvariantViolation(format!(
          "file {file_id} has no current needs assessment"
        ))
        .into(),
      );
    };

    let mut plan = Vec::with_capacity(supports.len());
    let mut keys = Vec::with_capacity(supports.len());
    for support in &supports {
      self.resolve_support_references(support, file.file_key).await?;
      let row = SupportRow::new(support);

      match &support.id {
        None => {
          let key = Uuid::new_v4();
          keys.push(key);
          plan.push(PlannedWrite::Create {
            support_key: encode_uuid(key),
            status: initial_status(support.status)?.as_ref().to_owned(),
            row,
            members: support.household_member_ids.iter().copied().map(encode_uuid).collect(),
          });
        }
        Some(id) => {
          let existing = self
            .find_support(id)
            .await?
            .filter(|s| s.file_key == file.file_key)
            .ok_or_else(|| ess_core::Error::not_found("support", id))?;
          let current = self.support_member_ids(existing.support_key).await?;
          let diff = MemberDiff::between(&current, &support.household_member_ids);
          keys.push(existing.support_key);
          plan.push(PlannedWrite::Update {
            support_key: encode_uuid(existing.support_key),
            row,
            added: diff.added.into_iter().map(encode_uuid).collect(),
            removed: diff.removed.into_iter().map(encode_uuid).collect(),
          });
        }
      }
    }

    let file_key   = encode_uuid(file.file_key);
    let na_str     = encode_uuid(assessment);
    let created_at = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for write in &plan {
          match write {
            PlannedWrite::Create { support_key, status, row, members } => {
              let number: i64 = tx.query_row(
                "SELECT COALESCE(MAX(support_number), ?1) + 1 FROM supports",
                [NUMBER_BASE],
                |r| r.get(0),
              )?;
              tx.execute(
                "INSERT INTO supports (
                   support_key, support_number, file_key, needs_assessment_id,
                   category, method, status, active, valid_from, valid_to,
                   amount_cents, supplier_id, payee_id, group_lodging_city,
                   issued_by_id, manual_referral_id, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9, ?10, ?11, ?12,
                           ?13, ?14, ?15, ?16)",
                rusqlite::params![
                  support_key,
                  number,
                  file_key,
                  na_str,
                  row.category,
                  row.method,
                  status,
                  row.valid_from,
                  row.valid_to,
                  row.amount_cents,
                  row.supplier_id,
                  row.payee_id,
                  row.group_lodging_city,
                  row.issued_by_id,
                  row.manual_referral_id,
                  created_at,
                ],
              )?;
              for member in members {
                link_member(&tx, member, Role::Support, support_key)?;
              }
            }
            PlannedWrite::Update { support_key, row, added, removed } => {
              tx.execute(
                "UPDATE supports SET
                   category = ?2, method = ?3, valid_from = ?4, valid_to = ?5,
                   amount_cents = ?6, supplier_id = ?7, payee_id = ?8,
                   group_lodging_city = ?9, issued_by_id = ?10,
                   manual_referral_id = ?11
                 WHERE support_key = ?1",
                rusqlite::params![
                  support_key,
                  row.category,
                  row.method,
                  row.valid_from,
                  row.valid_to,
                  row.amount_cents,
                  row.supplier_id,
                  row.payee_id,
                  row.group_lodging_city,
                  row.issued_by_id,
                  row.manual_referral_id,
                ],
              )?;
              for member in removed {
                tx.execute(
                  "DELETE FROM member_links
                   WHERE member_id = ?1 AND role = ?2 AND owner_id = ?3",
                  rusqlite::params![member, Role::Support.as_str(), support_key],
                )?;
              }
              for member in added {
                link_member(&tx, member, Role::Support, support_key)?;
              }
            }
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    debug!(%file_id, count = keys.len(), "saved supports");
    self.supports_by_keys(keys).await
  }

  // ── Status ────────────────────────────────────────────────────────────────

  pub(crate) async fn apply_status_changes(
    &self,
    items: Vec<SupportStatusChange>,
  ) -> Result<Vec<String>> {
    // Every item is checked before the batch is written.
    let mut updates = Vec::with_capacity(items.len());
    for item in &items {
      let support = self.require_support(&item.support_id).await?;
      let update = plan_status_change(
        &item.support_id,
        support.method,
        item.to_status,
        item.reason.as_deref(),
      )?;
      updates.push((
        encode_uuid(support.support_key),
        update.status.as_ref().to_owned(),
        update.deactivate,
        update.void_reason.map(|r| r.as_ref().to_owned()),
      ));
    }

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for (key, status, deactivate, void_reason) in &updates {
          tx.execute(
            "UPDATE supports SET
               status = ?2,
               active = CASE WHEN ?3 THEN 0 ELSE active END,
               void_reason = COALESCE(?4, void_reason)
             WHERE support_key = ?1",
            rusqlite::params![key, status, deactivate, void_reason],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    let ids: Vec<String> = items.into_iter().map(|i| i.support_id).collect();
    info!(count = ids.len(), "changed support statuses");
    Ok(ids)
  }

  // ── Approval ──────────────────────────────────────────────────────────────

  pub(crate) async fn enqueue_for_approval(
    &self,
    support_id: String,
    flags: Vec<SupportFlag>,
  ) -> Result<QueueAssignment> {
    let support = self.require_support(&support_id).await?;

    let mut flag_rows = Vec::with_capacity(flags.len());
    for flag in &flags {
      let duplicate_of_key = match flag.duplicated_support_id() {
        Some(other) => {
          Some(encode_uuid(self.require_support(other).await?.support_key))
        }
        None => None,
      };
      flag_rows.push(FlagRow {
        flag_id: encode_uuid(Uuid::new_v4()),
        kind: flag.discriminant(),
        duplicate_of_key,
        detail: serde_json::to_string(flag)?,
      });
    }

    let queue         = Queue::for_flags(&flags);
    let queue_item_id = Uuid::new_v4();
    let item_str      = encode_uuid(queue_item_id);
    let queue_str     = encode_uuid(queue.id());
    let key_str       = encode_uuid(support.support_key);
    let status        = SupportStatus::PendingApproval.as_ref().to_owned();
    let created_at    = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for flag in &flag_rows {
          tx.execute(
            "INSERT INTO support_flags (
               flag_id, support_key, kind, duplicate_of_key, detail, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
              flag.flag_id,
              key_str,
              flag.kind,
              flag.duplicate_of_key,
              flag.detail,
              created_at,
            ],
          )?;
        }
        tx.execute(
          "INSERT INTO queue_items (
             queue_item_id, queue_id, object_type_code, support_key, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            item_str,
            queue_str,
            SUPPORT_OBJECT_TYPE_CODE,
            key_str,
            created_at,
          ],
        )?;
        tx.execute(
          "UPDATE supports SET status = ?2 WHERE support_key = ?1",
          rusqlite::params![key_str, status],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    info!(%support_id, %queue, flags = flags.len(), "submitted support for approval");
    Ok(QueueAssignment { support_id, queue_item_id, queue })
  }

  pub(crate) async fn read_queue_items(&self, support_id: String) -> Result<Vec<QueueItem>> {
    let support = self.require_support(&support_id).await?;
    let key_str = encode_uuid(support.support_key);

    let raw: Vec<(String, String, i32, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT queue_item_id, queue_id, object_type_code, created_at
           FROM queue_items WHERE support_key = ?1
           ORDER BY created_at, rowid",
        )?;
        let rows = stmt
          .query_map([key_str], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raw
      .into_iter()
      .map(|(item_id, queue_id, object_type_code, created_at)| {
        Ok(QueueItem {
          queue_item_id: decode_uuid(&item_id)?,
          queue: queue_for_id(decode_uuid(&queue_id)?)?,
          object_type_code,
          support_id: support_id.clone(),
          created_at: decode_dt(&created_at)?,
        })
      })
      .collect()
  }
}
