//! Integration Test: Singleton Prohibition
//!
//! **Policy**: Stream registries, token authorities and the active
//! conversation are explicit values handed to their users. Production code
//! MUST NOT hold them (or any other lock-protected state) in a `static`.
//! **Exceptions**: plain atomic id counters

use architectural_enforcement::find_violations;

fn is_global_state(code: &str) -> bool {
    let code = code.trim_start();
    let is_static = code.starts_with("static ") || code.starts_with("pub static ");
    let guarded = ["Mutex", "RwLock", "OnceLock", "OnceCell", "Lazy", "lazy_static", "Registry"]
        .iter()
        .any(|marker| code.contains(marker));
    (is_static && guarded) || code.starts_with("lazy_static!")
}

/// Test that production code keeps no global mutable state
#[test]
fn test_no_global_singletons() {
    let violations = find_violations(is_global_state);

    if !violations.is_empty() {
        eprintln!("\n❌ Global mutable state found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Construct the value at start-up and pass clones or references.");

        panic!("\nFound {} global singleton(s).", violations.len());
    }
}

#[test]
fn test_global_state_detection() {
    assert!(is_global_state(
        "static REGISTRY: OnceLock<StreamRegistry> = OnceLock::new();"
    ));
    assert!(is_global_state("pub static ACTIVE: Mutex<Option<String>> = Mutex::new(None);"));
    assert!(!is_global_state("        static COUNTER: AtomicU64 = AtomicU64::new(1);"));
    assert!(!is_global_state("let registry = StreamRegistry::new();"));
}
