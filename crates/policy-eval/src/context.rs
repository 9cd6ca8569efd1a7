//! Field resolution over the `subject | resource | action | context` root tree (§4.1).

use policy_core::model::{ActionRef, PolicyInput, RequestContext, ResourceFacts, SubjectFacts};
use policy_core::value::Value;

/// View over a `PolicyInput` used by the condition evaluator to resolve dotted field
/// paths. Kept separate from `PolicyInput` itself so callers can construct one cheaply
/// from borrowed facts without taking ownership.
pub struct EvalContext<'a> {
    pub subject: &'a SubjectFacts,
    pub resource: &'a ResourceFacts,
    pub action: &'a ActionRef,
    pub context: &'a RequestContext,
}

impl<'a> EvalContext<'a> {
    pub fn from_input(input: &'a PolicyInput) -> Self {
        Self {
            subject: &input.subject,
            resource: &input.resource,
            action: &input.action,
            context: &input.context,
        }
    }

    fn subject_root(&self) -> Value {
        let mut m = self.subject.attributes.clone();
        m.insert("principalId".into(), Value::String(self.subject.principal_id.clone()));
        m.insert(
            "principalType".into(),
            Value::String(
                match self.subject.principal_type {
                    policy_core::model::PrincipalType::User => "user",
                    policy_core::model::PrincipalType::Service => "service",
                }
                .to_string(),
            ),
        );
        m.insert(
            "roles".into(),
            Value::List(self.subject.roles.iter().cloned().map(Value::String).collect()),
        );
        m.insert(
            "groups".into(),
            Value::List(self.subject.groups.iter().cloned().map(Value::String).collect()),
        );
        if let Some(ou) = &self.subject.org_unit {
            m.insert("orgUnit".into(), Value::String(ou.clone()));
        }
        m.insert("attributes".into(), Value::Map(self.subject.attributes.clone()));
        Value::Map(m)
    }

    fn resource_root(&self) -> Value {
        let mut m = self.resource.attributes.clone();
        m.insert("type".into(), Value::String(self.resource.resource_type.clone()));
        if let Some(id) = &self.resource.id {
            m.insert("id".into(), Value::String(id.clone()));
        }
        if let Some(v) = &self.resource.version_id {
            m.insert("versionId".into(), Value::String(v.clone()));
        }
        if let Some(m2) = &self.resource.module {
            m.insert("module".into(), Value::String(m2.clone()));
        }
        if let Some(o) = &self.resource.owner_id {
            m.insert("ownerId".into(), Value::String(o.clone()));
        }
        m.insert("attributes".into(), Value::Map(self.resource.attributes.clone()));
        Value::Map(m)
    }

    fn action_root(&self) -> Value {
        let mut m = std::collections::BTreeMap::new();
        m.insert("namespace".into(), Value::String(self.action.namespace.as_str().to_string()));
        m.insert("code".into(), Value::String(self.action.code.clone()));
        m.insert("fullCode".into(), Value::String(self.action.full_code()));
        Value::Map(m)
    }

    fn context_root(&self) -> Value {
        let mut m = self.context.attributes.clone();
        m.insert("tenantId".into(), Value::String(self.context.tenant_id.clone()));
        m.insert("timestamp".into(), Value::Int(self.context.timestamp_ms as i64));
        if let Some(c) = &self.context.correlation_id {
            m.insert("correlationId".into(), Value::String(c.clone()));
        }
        if let Some(ip) = &self.context.ip {
            m.insert("ip".into(), Value::String(ip.clone()));
        }
        if let Some(ua) = &self.context.user_agent {
            m.insert("userAgent".into(), Value::String(ua.clone()));
        }
        if let Some(ch) = &self.context.channel {
            m.insert("channel".into(), Value::String(ch.clone()));
        }
        if let Some(geo) = &self.context.geo {
            m.insert("geo".into(), Value::String(geo.clone()));
        }
        m.insert("attributes".into(), Value::Map(self.context.attributes.clone()));
        Value::Map(m)
    }

    /// Resolve a dotted field path. Absent/undefined resolves to `Value::Null` at the
    /// boundary (the evaluator distinguishes "undefined" from caller-supplied `null`
    /// only via `exists`, which treats both the same way per §4.1).
    pub fn resolve(&self, field: &str) -> Value {
        let mut segments = field.split('.');
        let root_name = match segments.next() {
            Some(s) => s,
            None => return Value::Null,
        };
        let root = match root_name {
            "subject" => self.subject_root(),
            "resource" => self.resource_root(),
            "action" => self.action_root(),
            "context" => self.context_root(),
            // Shorthand: not a recognized root, so treat the whole path as an attribute
            // name and look it up on subject.attributes, then resource.attributes.
            _ => return self.resolve_shorthand(field),
        };
        walk(&root, segments)
    }

    fn resolve_shorthand(&self, name: &str) -> Value {
        if let Some(v) = self.subject.attributes.get(name) {
            return v.clone();
        }
        if let Some(v) = self.resource.attributes.get(name) {
            return v.clone();
        }
        Value::Null
    }
}

fn walk<'s>(root: &Value, mut segments: impl Iterator<Item = &'s str>) -> Value {
    match segments.next() {
        None => root.clone(),
        Some(seg) => match root.get(seg) {
            Some(next) => walk(next, segments),
            None => Value::Null,
        },
    }
}
