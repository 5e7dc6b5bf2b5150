//! Deterministic verifier plan selection (spec §4.4 step 1-4): "Given the
//! same `(mood, touched_paths, risk_tier, allowlist_version)` the planner
//! must always select the same verifiers in the same order."

use director_core::{canonical_json, content_uuid, sha256_hex, DirectorError, Mood, RiskTier, VerifierPlan};
use director_policy::{VerifierAllowlist, VerifierAllowlistEntry};

/// The verifier types a mood's minimum coverage rule admits. `None` means
/// every type in the allowlist is eligible (Skeptical/Paranoid/Bold still
/// differ in how `touched_paths` and independent re-runs are handled).
fn allowed_types_for(mood: Mood) -> Option<&'static [&'static str]> {
    match mood {
        Mood::Calm => Some(&["lint", "type"]),
        Mood::Curious => Some(&["compile"]),
        Mood::Skeptical | Mood::Paranoid | Mood::Bold => None,
        // Contrite/Petty/Deferential are never the mood a run executes verifiers
        // under (they gate commit via director-policy's always_blocks profile
        // instead), but a plan is still selected so the empty result is inert.
        Mood::Contrite | Mood::Petty | Mood::Deferential => Some(&[]),
    }
}

/// Whether `mood` bypasses the `touched_paths` scope filter entirely.
/// Bold "broadens scope" to integration/regression coverage beyond what was touched.
fn ignores_touched_paths(mood: Mood) -> bool {
    matches!(mood, Mood::Bold)
}

fn is_security_gate(entry: &VerifierAllowlistEntry) -> bool {
    entry.verifier_type == "security" || entry.verifier_type == "security_scan"
}

/// Selects and orders the verifiers a run must execute, per spec §4.4:
///
/// 1. Start from the allowlisted verifier set.
/// 2. Filter by the current mood's minimum coverage rule.
/// 3. Resolve verifier targets by `touched_paths -> verifier_globs` mapping
///    (Paranoid's security gates always apply, regardless of touched paths).
/// 4. Order deterministically by declared priority, then lexicographic id,
///    and derive a stable `plan_id` from the selection inputs.
///
/// # Errors
/// Returns [`DirectorError::ContractViolation`] if `allowlist` is empty;
/// selecting from an empty allowlist would make every plan vacuous.
pub fn select_plan(
    mood: Mood,
    touched_paths: &[String],
    risk_tier: RiskTier,
    allowlist: &VerifierAllowlist,
    allowlist_version: &str,
) -> Result<VerifierPlan, DirectorError> {
    if allowlist.is_empty() {
        return Err(DirectorError::ContractViolation(
            "verifier allowlist is empty; no verifier plan can be selected".to_string(),
        ));
    }

    let allowed_types = allowed_types_for(mood);
    let bypass_paths = ignores_touched_paths(mood);

    let mut selected: Vec<&VerifierAllowlistEntry> = allowlist
        .entries()
        .iter()
        .filter(|e| match allowed_types {
            Some(types) => types.contains(&e.verifier_type.as_str()),
            None => true,
        })
        .filter(|e| {
            is_security_gate(e) || bypass_paths || touched_paths.is_empty() || e.targets_any(touched_paths)
        })
        .collect();

    // Paranoid mandates at least the security gates even when the mood
    // filter above (`None`, i.e. "everything") already admits them; risk
    // tier raises coverage further by never narrowing the high-risk case.
    if risk_tier == RiskTier::High {
        for entry in allowlist.entries() {
            if is_security_gate(entry) && !selected.iter().any(|e| e.id == entry.id) {
                selected.push(entry);
            }
        }
    }

    selected.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
    selected.dedup_by(|a, b| a.id == b.id);

    let selected_ids: Vec<String> = selected.iter().map(|e| e.id.clone()).collect();

    let seed = canonical_json(&(
        mood.to_string(),
        touched_paths,
        risk_tier,
        allowlist_version,
    ))?;
    let plan_id = content_uuid(seed.as_bytes());
    let inputs_hash = sha256_hex(seed.as_bytes());

    Ok(VerifierPlan {
        plan_id,
        selected_verifiers: selected_ids,
        inputs_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowlist() -> VerifierAllowlist {
        VerifierAllowlist::new(vec![
            VerifierAllowlistEntry {
                id: "v-lint".into(),
                verifier_type: "lint".into(),
                command_template: "lint-tool check".into(),
                required_capabilities: vec!["exec".into()],
                declared_independent: true,
                priority: 10,
                path_globs: vec!["**".into()],
            },
            VerifierAllowlistEntry {
                id: "v-unit".into(),
                verifier_type: "unit".into(),
                command_template: "test-tool run".into(),
                required_capabilities: vec!["exec".into()],
                declared_independent: false,
                priority: 20,
                path_globs: vec!["src/**".into()],
            },
            VerifierAllowlistEntry {
                id: "v-security".into(),
                verifier_type: "security".into(),
                command_template: "security-tool scan".into(),
                required_capabilities: vec!["exec".into()],
                declared_independent: true,
                priority: 5,
                path_globs: vec!["**".into()],
            },
        ])
    }

    #[test]
    fn empty_allowlist_is_rejected() {
        let err = select_plan(
            Mood::Calm,
            &[],
            RiskTier::Low,
            &VerifierAllowlist::default(),
            "v1",
        )
        .unwrap_err();
        assert!(matches!(err, DirectorError::ContractViolation(_)));
    }

    #[test]
    fn calm_restricts_to_lint_and_type() {
        let plan = select_plan(Mood::Calm, &[], RiskTier::Low, &allowlist(), "v1").unwrap();
        assert_eq!(plan.selected_verifiers, vec!["v-lint".to_string()]);
    }

    #[test]
    fn same_inputs_produce_same_plan_id() {
        let a = select_plan(
            Mood::Skeptical,
            &["src/lib.rs".to_string()],
            RiskTier::Medium,
            &allowlist(),
            "v1",
        )
        .unwrap();
        let b = select_plan(
            Mood::Skeptical,
            &["src/lib.rs".to_string()],
            RiskTier::Medium,
            &allowlist(),
            "v1",
        )
        .unwrap();
        assert_eq!(a.plan_id, b.plan_id);
        assert_eq!(a.inputs_hash, b.inputs_hash);
        assert_eq!(a.selected_verifiers, b.selected_verifiers);
    }

    #[test]
    fn different_touched_paths_change_the_plan_id() {
        let a = select_plan(
            Mood::Skeptical,
            &["src/lib.rs".to_string()],
            RiskTier::Medium,
            &allowlist(),
            "v1",
        )
        .unwrap();
        let b = select_plan(
            Mood::Skeptical,
            &["docs/readme.md".to_string()],
            RiskTier::Medium,
            &allowlist(),
            "v1",
        )
        .unwrap();
        assert_ne!(a.plan_id, b.plan_id);
    }

    #[test]
    fn skeptical_scopes_unit_verifier_to_touched_paths() {
        let plan = select_plan(
            Mood::Skeptical,
            &["docs/readme.md".to_string()],
            RiskTier::Low,
            &allowlist(),
            "v1",
        )
        .unwrap();
        assert!(!plan.selected_verifiers.contains(&"v-unit".to_string()));
        assert!(plan.selected_verifiers.contains(&"v-lint".to_string()));
    }

    #[test]
    fn high_risk_always_includes_security_gate() {
        let plan = select_plan(
            Mood::Calm,
            &["docs/readme.md".to_string()],
            RiskTier::High,
            &allowlist(),
            "v1",
        )
        .unwrap();
        assert!(plan.selected_verifiers.contains(&"v-security".to_string()));
    }

    #[test]
    fn bold_ignores_touched_path_scoping() {
        let plan = select_plan(
            Mood::Bold,
            &["docs/readme.md".to_string()],
            RiskTier::Low,
            &allowlist(),
            "v1",
        )
        .unwrap();
        assert!(plan.selected_verifiers.contains(&"v-unit".to_string()));
    }

    #[test]
    fn ordering_is_by_priority_descending_then_id() {
        let plan = select_plan(
            Mood::Bold,
            &[],
            RiskTier::Low,
            &allowlist(),
            "v1",
        )
        .unwrap();
        assert_eq!(
            plan.selected_verifiers,
            vec!["v-unit".to_string(), "v-lint".to_string(), "v-security".to_string()]
        );
    }
}
