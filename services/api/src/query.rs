//! Filter, sort and projection language for user listings
//!
//! Listing requests carry a JSON filter written in the operator style of
//! document databases (`{"status": {"$in": ["active", "suspended"]}}`).
//! It is parsed into a closed [`Filter`] tree over a whitelist of user
//! fields. The PostgreSQL store renders the tree as SQL with bound
//! parameters and the in-memory store evaluates it directly, so both give
//! the same answers.
//!
//! Comparisons against a missing value (a user who never logged in has no
//! `lastActive`) are false for every operator, `$ne` and `$nin` included.

use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::{Postgres, QueryBuilder};
use std::cmp::Ordering;
use uuid::Uuid;

use crate::models::{PublicUser, User};

/// Page size when the request gives none or an unusable one
pub const DEFAULT_LIMIT: i64 = 10;

fn invalid(message: impl Into<String>) -> DatabaseError {
    DatabaseError::InvalidQuery(message.into())
}

/// User attributes that may appear in filters, sorts and projections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Id,
    Username,
    Firstname,
    Lastname,
    Email,
    Status,
    Type,
    LastActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Id,
    Text,
    Time,
}

impl UserField {
    pub fn parse(name: &str) -> DatabaseResult<Self> {
        match name {
            "id" | "_id" => Ok(UserField::Id),
            "username" => Ok(UserField::Username),
            "firstname" => Ok(UserField::Firstname),
            "lastname" => Ok(UserField::Lastname),
            "email" => Ok(UserField::Email),
            "status" => Ok(UserField::Status),
            "type" => Ok(UserField::Type),
            "lastActive" => Ok(UserField::LastActive),
            "createdAt" => Ok(UserField::CreatedAt),
            "updatedAt" => Ok(UserField::UpdatedAt),
            other => Err(invalid(format!("unknown field `{}`", other))),
        }
    }

    /// Column in the `users` table
    pub fn column(self) -> &'static str {
        match self {
            UserField::Id => "id",
            UserField::Username => "username",
            UserField::Firstname => "firstname",
            UserField::Lastname => "lastname",
            UserField::Email => "email",
            UserField::Status => "status",
            UserField::Type => "user_type",
            UserField::LastActive => "last_active",
            UserField::CreatedAt => "created_at",
            UserField::UpdatedAt => "updated_at",
        }
    }

    /// Key in the serialized [`PublicUser`]
    pub fn key(self) -> &'static str {
        match self {
            UserField::Id => "id",
            UserField::Username => "username",
            UserField::Firstname => "firstname",
            UserField::Lastname => "lastname",
            UserField::Email => "email",
            UserField::Status => "status",
            UserField::Type => "type",
            UserField::LastActive => "lastActive",
            UserField::CreatedAt => "createdAt",
            UserField::UpdatedAt => "updatedAt",
        }
    }

    fn kind(self) -> FieldKind {
        match self {
            UserField::Id => FieldKind::Id,
            UserField::LastActive | UserField::CreatedAt | UserField::UpdatedAt => FieldKind::Time,
            _ => FieldKind::Text,
        }
    }

    /// Current value of this field on a user
    pub fn value_of(self, user: &User) -> Option<Scalar> {
        match self {
            UserField::Id => Some(Scalar::Id(user.id)),
            UserField::Username => Some(Scalar::Text(user.username.clone())),
            UserField::Firstname => Some(Scalar::Text(user.firstname.clone())),
            UserField::Lastname => Some(Scalar::Text(user.lastname.clone())),
            UserField::Email => Some(Scalar::Text(user.email.clone())),
            UserField::Status => Some(Scalar::Text(user.status.as_str().to_string())),
            UserField::Type => Some(Scalar::Text(user.user_type.as_str().to_string())),
            UserField::LastActive => user.last_active.map(Scalar::Time),
            UserField::CreatedAt => Some(Scalar::Time(user.created_at)),
            UserField::UpdatedAt => Some(Scalar::Time(user.updated_at)),
        }
    }
}

/// A typed operand
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Id(Uuid),
    Text(String),
    Time(DateTime<Utc>),
}

impl Scalar {
    fn parse(field: UserField, value: &Value) -> DatabaseResult<Self> {
        let Value::String(raw) = value else {
            return Err(invalid(format!(
                "`{}` expects a string operand, got {}",
                field.key(),
                value
            )));
        };

        match field.kind() {
            FieldKind::Text => Ok(Scalar::Text(raw.clone())),
            FieldKind::Id => Uuid::parse_str(raw)
                .map(Scalar::Id)
                .map_err(|_| invalid(format!("`{}` is not a valid id", raw))),
            FieldKind::Time => DateTime::parse_from_rfc3339(raw)
                .map(|at| Scalar::Time(at.with_timezone(&Utc)))
                .map_err(|_| invalid(format!("`{}` is not an RFC 3339 timestamp", raw))),
        }
    }

    fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Id(a), Scalar::Id(b)) => Some(a.cmp(b)),
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            (Scalar::Time(a), Scalar::Time(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    fn push_bind(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Scalar::Id(id) => qb.push_bind(*id),
            Scalar::Text(text) => qb.push_bind(text.clone()),
            Scalar::Time(at) => qb.push_bind(*at),
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparison {
    fn sql(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Ne => ordering != Ordering::Equal,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Lte => ordering != Ordering::Greater,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Gte => ordering != Ordering::Less,
        }
    }
}

/// Parsed user filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        field: UserField,
        op: Comparison,
        value: Scalar,
    },
    In {
        field: UserField,
        values: Vec<Scalar>,
        negated: bool,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::all()
    }
}

impl Filter {
    /// Filter that matches every user
    pub fn all() -> Self {
        Filter::And(Vec::new())
    }

    pub fn compare(field: UserField, op: Comparison, value: Scalar) -> Self {
        Filter::Compare { field, op, value }
    }

    pub fn not_in(field: UserField, values: Vec<Scalar>) -> Self {
        Filter::In {
            field,
            values,
            negated: true,
        }
    }

    /// Parse a filter document
    pub fn parse(document: &Value) -> DatabaseResult<Self> {
        let Value::Object(map) = document else {
            return Err(invalid("filter must be a JSON object"));
        };

        let mut clauses = Vec::with_capacity(map.len());
        for (key, value) in map {
            if key.starts_with('$') {
                clauses.push(Self::parse_logical(key, value)?);
            } else {
                let field = UserField::parse(key)?;
                clauses.extend(Self::parse_field(field, value)?);
            }
        }

        Ok(Self::conjunction(clauses))
    }

    /// Parse a logical operator (`$or`, `$and`, `$nor`) applied to an array
    /// of filter documents
    pub fn parse_logical(operator: &str, operands: &Value) -> DatabaseResult<Self> {
        let Value::Array(items) = operands else {
            return Err(invalid(format!("`{}` expects an array", operator)));
        };
        if items.is_empty() {
            return Err(invalid(format!("`{}` expects a non-empty array", operator)));
        }

        let parts = items
            .iter()
            .map(Self::parse)
            .collect::<DatabaseResult<Vec<_>>>()?;

        match operator {
            "$and" => Ok(Filter::And(parts)),
            "$or" => Ok(Filter::Or(parts)),
            "$nor" => Ok(Filter::Nor(parts)),
            other => Err(invalid(format!("unsupported operator `{}`", other))),
        }
    }

    fn parse_field(field: UserField, value: &Value) -> DatabaseResult<Vec<Filter>> {
        match value {
            Value::Object(operators) if operators.is_empty() => Err(invalid(format!(
                "`{}` has an empty operator object",
                field.key()
            ))),
            Value::Object(operators) => operators
                .iter()
                .map(|(operator, operand)| Self::parse_operator(field, operator, operand))
                .collect(),
            scalar => Ok(vec![Filter::compare(
                field,
                Comparison::Eq,
                Scalar::parse(field, scalar)?,
            )]),
        }
    }

    fn parse_operator(field: UserField, operator: &str, operand: &Value) -> DatabaseResult<Self> {
        let op = match operator {
            "$eq" => Comparison::Eq,
            "$ne" => Comparison::Ne,
            "$lt" => Comparison::Lt,
            "$lte" => Comparison::Lte,
            "$gt" => Comparison::Gt,
            "$gte" => Comparison::Gte,
            "$in" | "$nin" => {
                let Value::Array(items) = operand else {
                    return Err(invalid(format!("`{}` expects an array", operator)));
                };
                let values = items
                    .iter()
                    .map(|item| Scalar::parse(field, item))
                    .collect::<DatabaseResult<Vec<_>>>()?;
                return Ok(Filter::In {
                    field,
                    values,
                    negated: operator == "$nin",
                });
            }
            other => return Err(invalid(format!("unsupported operator `{}`", other))),
        };

        let ordered = matches!(
            op,
            Comparison::Lt | Comparison::Lte | Comparison::Gt | Comparison::Gte
        );
        if ordered && field.kind() != FieldKind::Time {
            return Err(invalid(format!(
                "`{}` only applies to timestamp fields, not `{}`",
                operator,
                field.key()
            )));
        }

        Ok(Filter::compare(field, op, Scalar::parse(field, operand)?))
    }

    fn conjunction(mut clauses: Vec<Filter>) -> Self {
        if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            Filter::And(clauses)
        }
    }

    /// Both filters must hold
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut parts) => {
                parts.push(other);
                Self::conjunction(parts)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    /// Evaluate the filter against a user
    pub fn matches(&self, user: &User) -> bool {
        match self {
            Filter::Compare { field, op, value } => field
                .value_of(user)
                .and_then(|actual| actual.compare(value))
                .is_some_and(|ordering| op.holds(ordering)),
            Filter::In {
                field,
                values,
                negated,
            } => match field.value_of(user) {
                Some(actual) => values.contains(&actual) != *negated,
                None => false,
            },
            Filter::And(parts) => parts.iter().all(|part| part.matches(user)),
            Filter::Or(parts) => parts.iter().any(|part| part.matches(user)),
            Filter::Nor(parts) => !parts.iter().any(|part| part.matches(user)),
        }
    }

    /// Append the filter to a query as a boolean SQL expression
    ///
    /// Every leaf is wrapped so that NULL columns yield `FALSE`, which keeps
    /// `NOT` over a disjunction well defined.
    pub fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Filter::Compare { field, op, value } => {
                qb.push("COALESCE(")
                    .push(field.column())
                    .push(" ")
                    .push(op.sql())
                    .push(" ");
                value.push_bind(qb);
                qb.push(", FALSE)");
            }
            Filter::In {
                field,
                values,
                negated,
            } => {
                if values.is_empty() {
                    if *negated {
                        qb.push("(").push(field.column()).push(" IS NOT NULL)");
                    } else {
                        qb.push("FALSE");
                    }
                    return;
                }

                qb.push("COALESCE(").push(field.column());
                qb.push(if *negated { " NOT IN (" } else { " IN (" });
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        qb.push(", ");
                    }
                    value.push_bind(qb);
                }
                qb.push("), FALSE)");
            }
            Filter::And(parts) => push_joined(qb, parts, " AND ", "TRUE"),
            Filter::Or(parts) => push_joined(qb, parts, " OR ", "FALSE"),
            Filter::Nor(parts) => {
                qb.push("NOT ");
                push_joined(qb, parts, " OR ", "FALSE");
            }
        }
    }
}

fn push_joined(qb: &mut QueryBuilder<'_, Postgres>, parts: &[Filter], separator: &str, empty: &str) {
    if parts.is_empty() {
        qb.push(empty);
        return;
    }

    qb.push("(");
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            qb.push(separator);
        }
        part.push_sql(qb);
    }
    qb.push(")");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Sort keys, applied left to right, then creation order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sort(pub Vec<(UserField, Direction)>);

impl Sort {
    /// Parse `"-createdAt username"` style strings or a JSON object such as
    /// `{"createdAt": -1}`
    pub fn parse(raw: &str) -> DatabaseResult<Self> {
        let raw = raw.trim();
        if raw.starts_with('{') {
            let document: Map<String, Value> = serde_json::from_str(raw)
                .map_err(|e| invalid(format!("sort is not valid JSON: {}", e)))?;
            return document
                .iter()
                .map(|(key, direction)| {
                    let direction = match direction {
                        Value::Number(n) if n.as_i64() == Some(1) => Direction::Asc,
                        Value::Number(n) if n.as_i64() == Some(-1) => Direction::Desc,
                        Value::String(s) if s == "asc" || s == "ascending" => Direction::Asc,
                        Value::String(s) if s == "desc" || s == "descending" => Direction::Desc,
                        other => {
                            return Err(invalid(format!("invalid sort direction {}", other)));
                        }
                    };
                    Ok((UserField::parse(key)?, direction))
                })
                .collect::<DatabaseResult<Vec<_>>>()
                .map(Sort);
        }

        raw.split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .map(|token| match token.strip_prefix('-') {
                Some(name) => Ok((UserField::parse(name)?, Direction::Desc)),
                None => Ok((
                    UserField::parse(token.trim_start_matches('+'))?,
                    Direction::Asc,
                )),
            })
            .collect::<DatabaseResult<Vec<_>>>()
            .map(Sort)
    }

    pub fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" ORDER BY ");
        for (field, direction) in &self.0 {
            qb.push(field.column());
            qb.push(match direction {
                Direction::Asc => " ASC NULLS FIRST, ",
                Direction::Desc => " DESC NULLS LAST, ",
            });
        }
        qb.push("created_at ASC, id ASC");
    }

    /// Order two users; missing values sort before present ones
    pub fn compare(&self, a: &User, b: &User) -> Ordering {
        for (field, direction) in &self.0 {
            let ordering = match (field.value_of(a), field.value_of(b)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => x.compare(&y).unwrap_or(Ordering::Equal),
            };
            let ordering = match direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Which fields of a user a listing returns
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Only these fields, plus `id`
    Include(Vec<UserField>),
    /// Everything but these fields
    Exclude(Vec<UserField>),
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Include(Vec::new())
    }
}

impl Projection {
    /// Parse `select` entries such as `["firstname lastname"]` or
    /// `["-email"]`
    ///
    /// The password never appears in output, so naming it is a no-op.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> DatabaseResult<Self> {
        let tokens: Vec<&str> = entries
            .iter()
            .flat_map(|entry| entry.as_ref().split(|c: char| c.is_whitespace() || c == ','))
            .filter(|token| !token.is_empty())
            .filter(|token| token.trim_start_matches(['-', '+']) != "password")
            .collect();

        if tokens.is_empty() {
            return Ok(Projection::default());
        }

        let excluded = tokens.iter().filter(|token| token.starts_with('-')).count();
        if excluded == tokens.len() {
            tokens
                .iter()
                .map(|token| UserField::parse(&token[1..]))
                .collect::<DatabaseResult<Vec<_>>>()
                .map(Projection::Exclude)
        } else if excluded == 0 {
            tokens
                .iter()
                .map(|token| UserField::parse(token.trim_start_matches('+')))
                .collect::<DatabaseResult<Vec<_>>>()
                .map(Projection::Include)
        } else {
            Err(invalid("select cannot mix included and excluded fields"))
        }
    }

    /// Shape a user according to the projection
    pub fn apply(&self, user: &PublicUser) -> Value {
        let mut fields = match serde_json::to_value(user) {
            Ok(Value::Object(fields)) => fields,
            _ => Map::new(),
        };

        match self {
            Projection::Include(keep) => {
                fields.retain(|key, _| {
                    key == UserField::Id.key() || keep.iter().any(|field| field.key() == key)
                });
            }
            Projection::Exclude(drop) => {
                for field in drop {
                    fields.remove(field.key());
                }
            }
        }

        Value::Object(fields)
    }
}

/// Reject any population request
///
/// Users hold no references to other records, so every path is unknown.
pub fn check_populate<S: AsRef<str>>(paths: &[S]) -> DatabaseResult<()> {
    let requested = paths
        .iter()
        .flat_map(|entry| entry.as_ref().split(|c: char| c.is_whitespace() || c == ','))
        .find(|path| !path.is_empty());

    match requested {
        Some(path) => Err(invalid(format!(
            "Cannot populate path `{}` because it is not in the user schema",
            path
        ))),
        None => Ok(()),
    }
}

/// Page size from a raw query value; non-positive or unparsable gives the
/// default
pub fn normalize_limit(raw: Option<&str>) -> i64 {
    raw.and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_LIMIT)
}

/// A listing query ready for a store
#[derive(Debug, Clone, PartialEq)]
pub struct UserQuery {
    pub filter: Filter,
    pub sort: Sort,
    pub limit: i64,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            filter: Filter::all(),
            sort: Sort::default(),
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Listing parameters as they arrive on the query string
///
/// Unknown parameters, `lean` included, are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// JSON filter document
    pub query: Option<String>,
    /// JSON array of filter documents combined with `query_array_type`
    pub query_array: Option<String>,
    /// `$or`, `$and` or `$nor`
    pub query_array_type: Option<String>,
    #[serde(default)]
    pub populate_array: Vec<String>,
    pub sort: Option<String>,
    pub limit: Option<String>,
    #[serde(default)]
    pub select: Vec<String>,
}

impl ListParams {
    pub fn into_query(self) -> DatabaseResult<(UserQuery, Projection)> {
        check_populate(&self.populate_array)?;

        let mut filter = match self.query.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let document: Value = serde_json::from_str(raw)
                    .map_err(|e| invalid(format!("query is not valid JSON: {}", e)))?;
                Filter::parse(&document)?
            }
            _ => Filter::all(),
        };

        if let Some(raw) = self.query_array.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
            let operator = self
                .query_array_type
                .as_deref()
                .ok_or_else(|| invalid("queryArray requires queryArrayType"))?;
            let operands: Value = serde_json::from_str(raw)
                .map_err(|e| invalid(format!("queryArray is not valid JSON: {}", e)))?;
            filter = filter.and(Filter::parse_logical(operator, &operands)?);
        }

        let sort = match self.sort.as_deref() {
            Some(raw) => Sort::parse(raw)?,
            None => Sort::default(),
        };

        let query = UserQuery {
            filter,
            sort,
            limit: normalize_limit(self.limit.as_deref()),
        };

        Ok((query, Projection::parse(&self.select)?))
    }
}

/// Single-user read parameters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetParams {
    #[serde(default)]
    pub populate_array: Vec<String>,
    #[serde(default)]
    pub select: Vec<String>,
}

impl GetParams {
    pub fn projection(&self) -> DatabaseResult<Projection> {
        check_populate(&self.populate_array)?;
        Projection::parse(&self.select)
    }
}
