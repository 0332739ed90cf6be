use crate::client::ApiClient;
use crate::settings::SettingsStore;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use thiserror::Error;

const BASE: &str = "/v1/perspective_schemas";
const LIST_CACHE: &str = "perspective_list";

pub const AWS_ACCOUNT: &str = "AwsAccount";
const STATIC_GROUP: &str = "static group";
const EXPIRED: &str = "expired";
const VERSION: &str = "Version";

#[derive(Debug, Error)]
pub enum PerspectiveError {
    #[error("perspective has no static group constant")]
    MissingGroupDirectory,
    #[error("no perspective named `{0}`")]
    PerspectiveNotFound(String),
}

/// A perspective schema. Fields this client never touches (`merges`, the
/// perspective name, report settings, ...) are carried in `extra` and
/// round-trip unmodified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Perspective {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub constants: Vec<Constant>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Constant {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub list: Vec<GroupEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ref_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub asset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default)]
    pub condition: Condition,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Condition {
    #[serde(default)]
    pub clauses: Vec<Clause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combine_with: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clause {
    #[serde(default)]
    pub asset_ref: String,
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub val: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Clause {
    fn account(id: &str) -> Self {
        Self {
            asset_ref: id.to_string(),
            op: "=".to_string(),
            val: id.to_string(),
            extra: Map::new(),
        }
    }
}

impl Rule {
    fn group_membership(group_id: &str) -> Self {
        Self {
            kind: "filter".to_string(),
            asset: AWS_ACCOUNT.to_string(),
            to: Some(group_id.to_string()),
            from: None,
            condition: Condition::default(),
            extra: Map::new(),
        }
    }

    fn is_group_membership(&self, group_id: &str) -> bool {
        self.asset == AWS_ACCOUNT && self.to.as_deref() == Some(group_id) && self.from.is_none()
    }
}

impl Perspective {
    /// The group directory: the `list` of the constant whose type is
    /// `"static group"` (case-insensitive).
    pub fn groups(&self) -> Result<&[GroupEntry], PerspectiveError> {
        self.constants
            .iter()
            .find(|c| c.kind.eq_ignore_ascii_case(STATIC_GROUP))
            .map(|c| c.list.as_slice())
            .ok_or(PerspectiveError::MissingGroupDirectory)
    }

    /// Resolves a group name to its ref_id (case-insensitive). When no
    /// group matches, the name itself is returned unchanged and a later
    /// rule lookup will be keyed by that literal string.
    pub fn resolve_group_id(&self, group_name: &str) -> Result<String, PerspectiveError> {
        let groups = self.groups()?;
        Ok(groups
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(group_name))
            .map(|g| g.ref_id.clone())
            .unwrap_or_else(|| group_name.to_string()))
    }

    /// Finds the rule holding account membership for `group_id`, creating
    /// and appending one when absent. The returned reference points into
    /// `self.rules`, so mutations land in the document. Never creates a
    /// second rule for the same group.
    pub fn group_rule_mut(&mut self, group_id: &str) -> &mut Rule {
        let idx = match self.rules.iter().position(|r| r.is_group_membership(group_id)) {
            Some(idx) => idx,
            None => {
                self.rules.push(Rule::group_membership(group_id));
                self.rules.len() - 1
            }
        };
        &mut self.rules[idx]
    }

    /// Appends one clause per account id (in input order) to the
    /// membership rule for `group_name`, then marks the condition as OR-
    /// combined when it holds more than one clause.
    pub fn add_accounts_to_group(
        &mut self,
        account_ids: &[String],
        group_name: &str,
    ) -> Result<(), PerspectiveError> {
        let group_id = self.resolve_group_id(group_name)?;
        let rule = self.group_rule_mut(&group_id);
        for id in account_ids {
            rule.condition.clauses.push(Clause::account(id));
        }
        if rule.condition.clauses.len() > 1 {
            rule.condition.combine_with = Some("OR".to_string());
        }
        Ok(())
    }

    /// Drops every clause referencing `account_ref_id` from account rules,
    /// then drops rules left without clauses. Pure; the caller persists.
    pub fn remove_account_refs(&mut self, account_ref_id: &str) {
        for rule in &mut self.rules {
            if rule.asset == AWS_ACCOUNT {
                rule.condition
                    .clauses
                    .retain(|clause| clause.asset_ref != account_ref_id);
            }
        }
        self.rules.retain(|rule| !rule.condition.clauses.is_empty());
    }

    /// Cleanup the server requires before any PUT, in order:
    /// 1. drop `Version` constants,
    /// 2. collect and remove `"expired"` directory entries,
    /// 3. drop clauses referencing the expired ids,
    /// 4. drop rules left without clauses.
    ///
    /// Running this twice removes nothing the second time.
    pub fn sanitize_for_update(&mut self) -> &mut Self {
        self.constants.retain(|constant| constant.kind != VERSION);

        let mut expired: HashSet<String> = HashSet::new();
        for constant in &mut self.constants {
            for entry in &constant.list {
                if entry.name == EXPIRED {
                    expired.insert(entry.ref_id.clone());
                }
            }
            constant.list.retain(|entry| entry.name != EXPIRED);
        }

        for rule in &mut self.rules {
            rule.condition
                .clauses
                .retain(|clause| !expired.contains(&clause.asset_ref));
        }
        self.rules.retain(|rule| !rule.condition.clauses.is_empty());
        self
    }
}

/// An account argument: a bare id or a full account entity. Normalized to
/// ids once at the boundary of `add_to_group`.
#[derive(Debug, Clone)]
pub enum AccountRef {
    Id(String),
    Entity(Value),
}

impl AccountRef {
    pub fn into_id(self) -> Result<String> {
        match self {
            AccountRef::Id(id) => Ok(id),
            AccountRef::Entity(entity) => match entity.get("id") {
                Some(Value::String(id)) => Ok(id.clone()),
                Some(Value::Number(id)) => Ok(id.to_string()),
                _ => Err(anyhow!("account entity has no id field")),
            },
        }
    }
}

#[derive(Debug)]
pub struct PerspectiveClient<'a> {
    api: &'a ApiClient,
    store: &'a SettingsStore,
}

impl<'a> PerspectiveClient<'a> {
    pub fn new(api: &'a ApiClient, store: &'a SettingsStore) -> Self {
        Self { api, store }
    }

    /// Lists perspectives as a map of id to `{name, active}`. A fresh
    /// fetch refreshes the cached copy in the settings store; with
    /// `use_cache` the stored copy is re-used when present.
    pub fn list(&self, use_cache: bool) -> Result<Value> {
        if use_cache {
            if let Some(cached) = self.store.cache_get(LIST_CACHE)? {
                return Ok(cached);
            }
        }
        let response = self.api.get(BASE, &[])?;
        let listing = response
            .json
            .context("perspective list response was not JSON")?;
        self.store.cache_set(LIST_CACHE, listing.clone())?;
        Ok(listing)
    }

    /// Resolves a perspective name to its id (case-insensitive).
    pub fn lookup_id(&self, name: &str, use_cache: bool) -> Result<String> {
        let listing = self.list(use_cache)?;
        let entries = listing
            .as_object()
            .context("perspective list was not an object")?;
        for (id, entry) in entries {
            let matches = entry
                .get("name")
                .and_then(Value::as_str)
                .map(|n| n.eq_ignore_ascii_case(name))
                .unwrap_or(false);
            if matches {
                return Ok(id.clone());
            }
        }
        Err(PerspectiveError::PerspectiveNotFound(name.to_string()).into())
    }

    /// Fetches one perspective. A non-numeric argument is treated as a
    /// name and resolved through the listing first.
    pub fn get(&self, id_or_name: &str, use_cache: bool) -> Result<Perspective> {
        let id = if is_numeric(id_or_name) {
            id_or_name.to_string()
        } else {
            self.lookup_id(id_or_name, use_cache)?
        };

        let response = self.api.get(
            &format!("{}/{}", BASE, id),
            &[("include_version", "true".to_string())],
        )?;
        let json = response
            .json
            .context("perspective response was not JSON")?;
        let schema = json
            .get("schema")
            .cloned()
            .context("perspective response missing schema")?;
        let mut perspective: Perspective =
            serde_json::from_value(schema).context("parsing perspective schema")?;
        perspective.id = Some(id);
        Ok(perspective)
    }

    /// Creates a perspective. An input already wrapped in a `schema` key
    /// is unwrapped before re-wrapping for the POST.
    pub fn create(&self, schema: Value) -> Result<Value> {
        let schema = match schema {
            Value::Object(mut map) if map.contains_key("schema") => {
                map.remove("schema").unwrap_or(Value::Null)
            }
            other => other,
        };
        let response = self
            .api
            .post_json(BASE, &[], Some(&json!({ "schema": schema })))?;
        Ok(response.json.unwrap_or(Value::String(response.body)))
    }

    /// Sanitizes the document and PUTs it. Returns the document as sent.
    pub fn update(&self, mut perspective: Perspective) -> Result<Perspective> {
        perspective.sanitize_for_update();
        let id = perspective
            .id
            .clone()
            .context("perspective document has no id")?;
        self.api.put_json(
            &format!("{}/{}", BASE, id),
            &[],
            Some(&json!({ "schema": perspective })),
        )?;
        Ok(perspective)
    }

    pub fn destroy(&self, id: &str, force: bool, hard_delete: bool) -> Result<String> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if force || hard_delete {
            query.push(("force", "true".to_string()));
        }
        if hard_delete {
            query.push(("hard_delete", "true".to_string()));
        }
        self.api.delete(&format!("{}/{}", BASE, id), &query)?;
        Ok("perspective destroyed".to_string())
    }

    /// Adds accounts to a named group of an already-fetched document and
    /// persists the result. Any failure aborts the whole call; the remote
    /// document is only touched by the final update.
    pub fn add_to_group(
        &self,
        mut perspective: Perspective,
        accounts: Vec<AccountRef>,
        group_name: &str,
    ) -> Result<Perspective> {
        let ids = accounts
            .into_iter()
            .map(AccountRef::into_id)
            .collect::<Result<Vec<_>>>()?;
        perspective.add_accounts_to_group(&ids, group_name)?;
        self.update(perspective)
    }

    /// Same as [`add_to_group`](Self::add_to_group), starting from a
    /// perspective id or name (one extra fetch).
    pub fn add_to_group_by_id(
        &self,
        id_or_name: &str,
        accounts: Vec<AccountRef>,
        group_name: &str,
    ) -> Result<Perspective> {
        let perspective = self.get(id_or_name, false)?;
        self.add_to_group(perspective, accounts, group_name)
    }

    /// Removes every reference to an account from a perspective's rules
    /// and persists the result.
    pub fn remove_account(&self, id_or_name: &str, account_ref_id: &str) -> Result<Perspective> {
        let mut perspective = self.get(id_or_name, false)?;
        perspective.remove_account_refs(account_ref_id);
        self.update(perspective)
    }

    /// Lists the groups of a perspective given its id or name.
    pub fn list_groups(&self, id_or_name: &str) -> Result<Vec<GroupEntry>> {
        let perspective = self.get(id_or_name, false)?;
        let groups = perspective.groups()?;
        Ok(groups.to_vec())
    }
}

fn is_numeric(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SETTINGS_FILE;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn perspective(json: Value) -> Perspective {
        serde_json::from_value(json).unwrap()
    }

    fn sample() -> Perspective {
        perspective(json!({
            "name": "test perspective",
            "merges": [{"from": "x", "to": "y"}],
            "constants": [
                {
                    "type": "Static Group",
                    "list": [
                        {"name": "bens group", "ref_id": "5678"},
                        {"name": "Other Group", "ref_id": "9999"}
                    ]
                }
            ],
            "rules": []
        }))
    }

    #[test]
    fn resolve_group_id_is_case_insensitive() {
        let pers = sample();
        for name in ["bens group", "Bens Group", "BENS GROUP"] {
            assert_eq!(pers.resolve_group_id(name).unwrap(), "5678");
        }
    }

    #[test]
    fn resolve_group_id_falls_back_to_literal_name() {
        let pers = sample();
        assert_eq!(pers.resolve_group_id("no such group").unwrap(), "no such group");
    }

    #[test]
    fn missing_group_directory_is_an_error() {
        let pers = perspective(json!({"constants": [{"type": "Version"}], "rules": []}));
        assert!(matches!(
            pers.groups(),
            Err(PerspectiveError::MissingGroupDirectory)
        ));
        assert!(pers.resolve_group_id("g").is_err());
    }

    #[test]
    fn group_rule_mut_never_duplicates() {
        let mut pers = sample();
        pers.group_rule_mut("5678").condition.clauses.push(Clause::account("1"));
        pers.group_rule_mut("5678").condition.clauses.push(Clause::account("2"));

        assert_eq!(pers.rules.len(), 1);
        assert_eq!(pers.rules[0].condition.clauses.len(), 2);
    }

    #[test]
    fn group_rule_mut_skips_rules_with_from_or_other_asset() {
        let mut pers = perspective(json!({
            "constants": [],
            "rules": [
                {"type": "filter", "asset": "AwsAsset", "to": "5678",
                 "condition": {"clauses": [{"asset_ref": "a"}]}},
                {"type": "filter", "asset": "AwsAccount", "to": "5678", "from": "1111",
                 "condition": {"clauses": [{"asset_ref": "b"}]}}
            ]
        }));

        pers.group_rule_mut("5678").condition.clauses.push(Clause::account("1"));

        assert_eq!(pers.rules.len(), 3);
        assert_eq!(pers.rules[2].asset, AWS_ACCOUNT);
        assert_eq!(pers.rules[2].from, None);
    }

    #[test]
    fn add_accounts_appends_in_order_and_sets_combine_with() {
        let mut pers = sample();
        pers.add_accounts_to_group(&["1234".into(), "7890".into()], "bens group")
            .unwrap();

        let rule = &pers.rules[0];
        assert_eq!(rule.kind, "filter");
        assert_eq!(rule.asset, AWS_ACCOUNT);
        assert_eq!(rule.to.as_deref(), Some("5678"));
        assert_eq!(rule.from, None);
        assert_eq!(rule.condition.clauses.len(), 2);
        assert_eq!(rule.condition.clauses[0], Clause::account("1234"));
        assert_eq!(rule.condition.clauses[1], Clause::account("7890"));
        assert_eq!(rule.condition.combine_with.as_deref(), Some("OR"));
    }

    #[test]
    fn single_account_leaves_combine_with_unset() {
        let mut pers = sample();
        pers.add_accounts_to_group(&["1234".into()], "bens group").unwrap();

        assert_eq!(pers.rules[0].condition.clauses.len(), 1);
        assert_eq!(pers.rules[0].condition.combine_with, None);
    }

    #[test]
    fn remove_account_refs_is_idempotent_and_drops_empty_rules() {
        let mut pers = perspective(json!({
            "constants": [],
            "rules": [
                {"type": "filter", "asset": "AwsAccount", "to": "g1",
                 "condition": {"clauses": [
                     {"asset_ref": "1234", "op": "=", "val": "1234"},
                     {"asset_ref": "7890", "op": "=", "val": "7890"}
                 ]}},
                {"type": "filter", "asset": "AwsAccount", "to": "g2",
                 "condition": {"clauses": [
                     {"asset_ref": "1234", "op": "=", "val": "1234"}
                 ]}}
            ]
        }));

        pers.remove_account_refs("1234");
        let once = pers.clone();
        pers.remove_account_refs("1234");

        // rule for g2 referenced only the removed account and is gone
        assert_eq!(pers, once);
        assert_eq!(pers.rules.len(), 1);
        assert_eq!(pers.rules[0].to.as_deref(), Some("g1"));
        assert_eq!(pers.rules[0].condition.clauses.len(), 1);
        assert_eq!(pers.rules[0].condition.clauses[0].asset_ref, "7890");
    }

    #[test]
    fn sanitize_strips_version_and_expired() {
        let mut pers = perspective(json!({
            "constants": [
                {"type": "Static Group", "list": [
                    {"name": "expired", "ref_id": "r0"},
                    {"name": "g1", "ref_id": "r1"}
                ]},
                {"type": "Version"}
            ],
            "rules": [
                {"type": "filter", "asset": "AwsAccount", "to": "r1",
                 "condition": {"clauses": [{"asset_ref": "r1"}, {"asset_ref": "r0"}]}}
            ]
        }));

        pers.sanitize_for_update();

        assert_eq!(pers.constants.len(), 1);
        assert_eq!(pers.constants[0].kind, "Static Group");
        assert_eq!(pers.constants[0].list.len(), 1);
        assert_eq!(pers.constants[0].list[0].name, "g1");
        assert_eq!(pers.rules.len(), 1);
        assert_eq!(pers.rules[0].condition.clauses.len(), 1);
        assert_eq!(pers.rules[0].condition.clauses[0].asset_ref, "r1");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let mut pers = perspective(json!({
            "constants": [
                {"type": "Static Group", "list": [
                    {"name": "expired", "ref_id": "r0"},
                    {"name": "g1", "ref_id": "r1"}
                ]},
                {"type": "Version"}
            ],
            "rules": [
                {"condition": {"clauses": [{"asset_ref": "r1"}, {"asset_ref": "r0"}]}},
                {"condition": {"clauses": [{"asset_ref": "r0"}]}}
            ]
        }));

        pers.sanitize_for_update();
        let once = pers.clone();
        pers.sanitize_for_update();

        assert_eq!(pers, once);
    }

    #[test]
    fn sanitize_tolerates_missing_rules_and_clauses() {
        let mut pers = perspective(json!({"name": "bare"}));
        pers.sanitize_for_update();
        assert!(pers.rules.is_empty());
        assert!(pers.constants.is_empty());
    }

    #[test]
    fn unknown_fields_round_trip() {
        let input = json!({
            "name": "test perspective",
            "include_in_reports": "true",
            "merges": [{"from": "x", "to": "y"}],
            "constants": [],
            "rules": []
        });
        let pers = perspective(input.clone());
        let output = serde_json::to_value(&pers).unwrap();

        assert_eq!(output["name"], input["name"]);
        assert_eq!(output["include_in_reports"], input["include_in_reports"]);
        assert_eq!(output["merges"], input["merges"]);
    }

    #[test]
    fn account_ref_normalization() {
        assert_eq!(AccountRef::Id("12".into()).into_id().unwrap(), "12");
        assert_eq!(
            AccountRef::Entity(json!({"id": "34", "name": "x"})).into_id().unwrap(),
            "34"
        );
        assert_eq!(
            AccountRef::Entity(json!({"id": 56})).into_id().unwrap(),
            "56"
        );
        assert!(AccountRef::Entity(json!({"name": "x"})).into_id().is_err());
    }

    fn store(dir: &tempfile::TempDir) -> SettingsStore {
        SettingsStore::new(dir.path().join(SETTINGS_FILE))
    }

    #[test]
    fn get_unwraps_schema_and_injects_id() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/perspective_schemas/123")
                .query_param("include_version", "true");
            then.status(200).json_body(json!({
                "schema": {"name": "prod", "rules": [], "constants": []}
            }));
        });
        let dir = tempdir().unwrap();
        let api = ApiClient::new(&server.base_url(), "k").unwrap();
        let settings = store(&dir);
        let client = PerspectiveClient::new(&api, &settings);

        let pers = client.get("123", false).unwrap();

        mock.assert();
        assert_eq!(pers.id.as_deref(), Some("123"));
        assert_eq!(pers.extra["name"], "prod");
    }

    #[test]
    fn get_by_name_resolves_through_listing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/perspective_schemas");
            then.status(200).json_body(json!({
                "1": {"name": "one", "active": true},
                "2": {"name": "Prod Accounts", "active": true}
            }));
        });
        let get = server.mock(|when, then| {
            when.method(GET).path("/v1/perspective_schemas/2");
            then.status(200)
                .json_body(json!({"schema": {"rules": [], "constants": []}}));
        });
        let dir = tempdir().unwrap();
        let api = ApiClient::new(&server.base_url(), "k").unwrap();
        let settings = store(&dir);
        let client = PerspectiveClient::new(&api, &settings);

        let pers = client.get("prod accounts", false).unwrap();

        get.assert();
        assert_eq!(pers.id.as_deref(), Some("2"));

        let err = client.lookup_id("nope", true).unwrap_err();
        assert!(err.to_string().contains("no perspective named"));
    }

    #[test]
    fn list_caches_and_reuses() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/v1/perspective_schemas");
            then.status(200).json_body(json!({"1": {"name": "one"}}));
        });
        let dir = tempdir().unwrap();
        let settings = store(&dir);
        let api = ApiClient::new(&server.base_url(), "k").unwrap();
        let client = PerspectiveClient::new(&api, &settings);

        let fresh = client.list(false).unwrap();
        let cached = client.list(true).unwrap();

        // the second call was served from the settings-store cache
        mock.assert_hits(1);
        assert_eq!(fresh, cached);
        assert_eq!(
            settings.cache_get("perspective_list").unwrap(),
            Some(json!({"1": {"name": "one"}}))
        );
    }

    #[test]
    fn add_to_group_by_id_fetches_mutates_and_puts_sanitized() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/perspective_schemas/7");
            then.status(200).json_body(json!({
                "schema": {
                    "name": "prod",
                    "constants": [
                        {"type": "Static Group", "list": [
                            {"name": "bens group", "ref_id": "5678"}
                        ]},
                        {"type": "Version"}
                    ],
                    "rules": []
                }
            }));
        });
        let put = server.mock(|when, then| {
            when.method(PUT)
                .path("/v1/perspective_schemas/7")
                .json_body(json!({
                    "schema": {
                        "id": "7",
                        "name": "prod",
                        "constants": [
                            {"type": "Static Group", "list": [
                                {"name": "bens group", "ref_id": "5678"}
                            ]}
                        ],
                        "rules": [
                            {"type": "filter", "asset": "AwsAccount", "to": "5678",
                             "condition": {
                                 "clauses": [
                                     {"asset_ref": "1234", "op": "=", "val": "1234"},
                                     {"asset_ref": "7890", "op": "=", "val": "7890"}
                                 ],
                                 "combine_with": "OR"
                             }}
                        ]
                    }
                }));
            then.status(200).json_body(json!({"message": "updated"}));
        });
        let dir = tempdir().unwrap();
        let api = ApiClient::new(&server.base_url(), "k").unwrap();
        let settings = store(&dir);
        let client = PerspectiveClient::new(&api, &settings);

        let updated = client
            .add_to_group_by_id(
                "7",
                vec![
                    AccountRef::Id("1234".into()),
                    AccountRef::Entity(json!({"id": "7890"})),
                ],
                "bens group",
            )
            .unwrap();

        put.assert();
        assert_eq!(updated.rules.len(), 1);
        assert_eq!(updated.rules[0].condition.combine_with.as_deref(), Some("OR"));
    }

    #[test]
    fn destroy_sends_force_flags() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE)
                .path("/v1/perspective_schemas/9")
                .query_param("force", "true")
                .query_param("hard_delete", "true");
            then.status(200).json_body(json!({}));
        });
        let dir = tempdir().unwrap();
        let api = ApiClient::new(&server.base_url(), "k").unwrap();
        let settings = store(&dir);
        let client = PerspectiveClient::new(&api, &settings);

        let message = client.destroy("9", false, true).unwrap();

        mock.assert();
        assert_eq!(message, "perspective destroyed");
    }
}
