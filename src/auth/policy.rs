/// Access Policies
///
/// A policy decides whether an authenticated identity may proceed with a
/// request. Policies in a set are OR-ed in order: the first one that admits
/// the request wins. A set with no policies denies everything.
use axum::http::request::Parts;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::types::Identity;

type PolicyFn = dyn Fn(&Parts, &Identity) -> bool + Send + Sync;

/// Predicate over (request, identity); `true` means allowed
#[derive(Clone)]
pub struct Policy {
    name: &'static str,
    check: Arc<PolicyFn>,
}

impl Policy {
    /// Wrap a custom predicate
    pub fn new<F>(name: &'static str, check: F) -> Self
    where
        F: Fn(&Parts, &Identity) -> bool + Send + Sync + 'static,
    {
        Self {
            name,
            check: Arc::new(check),
        }
    }

    /// Admit every authenticated identity
    pub fn allow_all() -> Self {
        Self::new("allow_all", |_, _| true)
    }

    /// Admit identities whose email exactly matches one of `emails`
    pub fn allowed_emails<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let emails: HashSet<String> = emails.into_iter().map(Into::into).collect();
        Self::new("allowed_emails", move |_, user| {
            user.email()
                .is_some_and(|email| !email.as_str().is_empty() && emails.contains(email.as_str()))
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn allows(&self, request: &Parts, user: &Identity) -> bool {
        (self.check)(request, user)
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Policy").field(&self.name).finish()
    }
}

/// Ordered policies combined with OR semantics
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    policies: Vec<Policy>,
}

impl PolicySet {
    pub fn new(policies: Vec<Policy>) -> Self {
        Self { policies }
    }

    pub fn push(&mut self, policy: Policy) {
        self.policies.push(policy);
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// First admitting policy, if any
    pub fn admitted_by(&self, request: &Parts, user: &Identity) -> Option<&Policy> {
        self.policies.iter().find(|p| p.allows(request, user))
    }

    /// `true` when at least one policy admits the request; an empty set denies
    pub fn decide(&self, request: &Parts, user: &Identity) -> bool {
        self.admitted_by(request, user).is_some()
    }
}

impl FromIterator<Policy> for PolicySet {
    fn from_iter<T: IntoIterator<Item = Policy>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
