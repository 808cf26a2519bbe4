//! Redefinition-compatibility rules.
//!
//! A pure diff over two [`ClassMetadata`] values. Method bodies are never
//! compared — they are never even extracted by [`crate::classfile::parse`] —
//! so changes confined to instructions, exception tables, line-number and
//! local-variable tables are accepted implicitly by simply not appearing in
//! the diff.

use bytehot_types::Violation;

use crate::classfile::{ClassMetadata, MemberDescriptor};

/// Compare `before` (the currently loaded class) against `after` (the
/// proposed replacement), returning every [`Violation`] found. An empty
/// result means `after` is redefinition-safe relative to `before`.
///
/// `allow_method_addition` is the router's resolution of "method addition is
/// tolerated only when the host VM explicitly permits it and validation is
/// running in lenient mode" — the validator itself is not aware of
/// instrumentation capability or configuration, only of the two class
/// bodies.
pub fn diff_classes(before: &ClassMetadata, after: &ClassMetadata, allow_method_addition: bool) -> Vec<Violation> {
    let mut violations = Vec::new();

    if before.access_flags != after.access_flags {
        violations.push(Violation::AccessFlagsChanged {
            before: before.access_flags,
            after: after.access_flags,
        });
    }

    if before.superclass != after.superclass || before.interfaces != after.interfaces {
        violations.push(Violation::HierarchyChanged {
            detail: describe_hierarchy_change(before, after),
        });
    }

    diff_fields(&before.fields, &after.fields, &mut violations);
    diff_methods(&before.methods, &after.methods, allow_method_addition, &mut violations);

    violations
}

fn describe_hierarchy_change(before: &ClassMetadata, after: &ClassMetadata) -> String {
    if before.superclass != after.superclass {
        format!(
            "superclass {} -> {}",
            before.superclass.as_deref().unwrap_or("<none>"),
            after.superclass.as_deref().unwrap_or("<none>")
        )
    } else {
        format!(
            "interfaces {:?} -> {:?}",
            before.interfaces, after.interfaces
        )
    }
}

fn diff_fields(before: &[MemberDescriptor], after: &[MemberDescriptor], violations: &mut Vec<Violation>) {
    for field in before {
        if !after.iter().any(|f| f.name == field.name && f.descriptor == field.descriptor) {
            violations.push(Violation::FieldRemoved {
                descriptor: field.to_string(),
            });
        }
    }
    for field in after {
        if !before.iter().any(|f| f.name == field.name && f.descriptor == field.descriptor) {
            violations.push(Violation::FieldAdded {
                descriptor: field.to_string(),
            });
        }
    }
}

fn diff_methods(
    before: &[MemberDescriptor],
    after: &[MemberDescriptor],
    allow_method_addition: bool,
    violations: &mut Vec<Violation>,
) {
    // Methods are matched by (name, descriptor), the same key diff_fields
    // uses, so that adding an overload (same name, new descriptor) can never
    // be mistaken for an unrelated method simply continuing to exist.
    let exact_match = |a: &MemberDescriptor, b: &MemberDescriptor| a.name == b.name && a.descriptor == b.descriptor;

    for method in before {
        let same_name_count = before.iter().filter(|m| m.name == method.name).count();
        let after_same_name: Vec<&MemberDescriptor> = after.iter().filter(|m| m.name == method.name).collect();
        // An unambiguous 1:1 name mapping on both sides reports an
        // access-flags or descriptor change as a signature change rather
        // than a remove+add pair.
        if same_name_count == 1 && after_same_name.len() == 1 {
            let candidate = after_same_name[0];
            if candidate.descriptor != method.descriptor || candidate.access_flags != method.access_flags {
                violations.push(Violation::MethodSignatureChanged {
                    before: method.to_string(),
                    after: candidate.to_string(),
                });
            }
            continue;
        }
        if !after.iter().any(|m| exact_match(m, method)) {
            violations.push(Violation::MethodRemoved {
                descriptor: method.to_string(),
            });
        }
    }
    for method in after {
        let same_name_count = before.iter().filter(|m| m.name == method.name).count();
        let after_same_name_count = after.iter().filter(|m| m.name == method.name).count();
        if same_name_count == 1 && after_same_name_count == 1 {
            continue; // already resolved as unchanged or a signature change above
        }
        if !before.iter().any(|m| exact_match(m, method)) && !allow_method_addition {
            violations.push(Violation::MethodAdded {
                descriptor: method.to_string(),
            });
        }
    }
}
