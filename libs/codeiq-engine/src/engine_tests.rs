/// End-to-end tests against real toolchains
///
/// These drive `Engine` with the production `TokioExecutor`:
/// 1. An echo program round-trips `"42\n"` to `"42"` in every language
/// 2. Compilation failures are batch-level
/// 3. Fail-fast stops at the first failing case
/// 4. Infinite loops end in TimeLimitExceeded
/// 5. Nothing is left in the scratch directory

#[cfg(test)]
mod toolchain_tests {
    use crate::dispatch::{Engine, EngineConfig};
    use codeiq_common::{CaseOutcome, ErrorKind, Language, RunResult, Stage, TestCase};
    use std::path::Path;
    use std::time::{Duration, Instant};

    fn scratch_is_empty(root: &Path) -> bool {
        std::fs::read_dir(root)
            .map(|mut rd| rd.next().is_none())
            .unwrap_or(true)
    }

    async fn echo(language: Language, source: &str) {
        let tmp = tempfile::tempdir().unwrap();
        let engine = Engine::new(EngineConfig::with_root(tmp.path()));

        let result = engine
            .execute(source, language, &[TestCase::new("testcase 1", "42\n")])
            .await;

        assert_eq!(
            result,
            RunResult::Completed(vec![CaseOutcome::Success {
                name: "testcase 1".to_string(),
                output: "42".to_string(),
            }]),
            "{} echo",
            language
        );
        assert!(scratch_is_empty(tmp.path()));
    }

    #[tokio::test]
    #[ignore] // Requires g++
    async fn test_cpp_echo() {
        echo(
            Language::Cpp,
            "#include <iostream>\n#include <string>\nint main(){std::string s;std::cin>>s;std::cout<<s<<std::endl;}\n",
        )
        .await;
    }

    #[tokio::test]
    #[ignore] // Requires python3
    async fn test_python_echo() {
        echo(Language::Python, "print(input())\n").await;
    }

    #[tokio::test]
    #[ignore] // Requires a JDK
    async fn test_java_echo() {
        echo(
            Language::Java,
            r#"
import java.util.Scanner;

public class Echo {
    static class Holder { String v; }

    public static void main(String[] args) {
        Holder h = new Holder();
        h.v = new Scanner(System.in).nextLine();
        System.out.println(h.v);
    }
}
"#,
        )
        .await;
    }

    #[tokio::test]
    #[ignore] // Requires node
    async fn test_js_echo() {
        echo(Language::JavaScript, "console.log(prompt());\n").await;
    }

    #[tokio::test]
    #[ignore] // Requires g++
    async fn test_cpp_compile_error() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = Engine::new(EngineConfig::with_root(tmp.path()));

        let result = engine
            .execute("int main( { return 0; }", Language::Cpp, &[TestCase::new("t1", "")])
            .await;

        let RunResult::Failed(failure) = result else {
            panic!("expected compile failure");
        };
        assert_eq!(failure.stage, Stage::Compile);
        assert_eq!(failure.kind, ErrorKind::CompilationError);
        assert!(!failure.message.contains(&tmp.path().display().to_string()));
        assert!(scratch_is_empty(tmp.path()));
    }

    #[tokio::test]
    #[ignore] // Requires g++
    async fn test_cpp_fail_fast() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = Engine::new(EngineConfig::with_root(tmp.path()));
        let source = "#include <iostream>\nint main(){int n;std::cin>>n;if(n==2)return 1;std::cout<<n;}\n";

        let result = engine
            .execute(
                source,
                Language::Cpp,
                &[
                    TestCase::new("t1", "1"),
                    TestCase::new("t2", "2"),
                    TestCase::new("t3", "3"),
                ],
            )
            .await;

        let RunResult::Failed(failure) = result else {
            panic!("expected fail-fast failure");
        };
        assert_eq!(failure.kind, ErrorKind::RuntimeError);
        assert_eq!(failure.message, "Exited with code 1");
        assert!(scratch_is_empty(tmp.path()));
    }

    #[tokio::test]
    #[ignore] // Requires python3
    async fn test_python_infinite_loop() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = Engine::new(EngineConfig::with_root(tmp.path()));
        let start = Instant::now();

        let result = engine
            .execute("while True:\n    pass\n", Language::Python, &[TestCase::new("t1", "")])
            .await;

        let RunResult::Failed(failure) = result else {
            panic!("expected timeout");
        };
        assert_eq!(failure.kind, ErrorKind::TimeLimitExceeded);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    #[ignore] // Requires node
    async fn test_js_isolation_and_syntax_error() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = Engine::new(EngineConfig::with_root(tmp.path()));
        let source = "const n = Number(prompt());\nif (n === 2) { throw new Error('two'); }\nconsole.log(n * 10);\n";

        let result = engine
            .execute(
                source,
                Language::JavaScript,
                &[
                    TestCase::new("t1", "1"),
                    TestCase::new("t2", "2"),
                    TestCase::new("t3", "3"),
                ],
            )
            .await;

        let RunResult::Completed(outcomes) = result else {
            panic!("script batches complete");
        };
        assert_eq!(outcomes[0], CaseOutcome::Success { name: "t1".into(), output: "10".into() });
        let CaseOutcome::Failure { error, .. } = &outcomes[1] else {
            panic!("t2 should fail");
        };
        assert_eq!(error.kind, ErrorKind::RuntimeError);
        assert_eq!(outcomes[2], CaseOutcome::Success { name: "t3".into(), output: "30".into() });

        let result = engine
            .execute("console.log(", Language::JavaScript, &[TestCase::new("t1", "")])
            .await;
        let RunResult::Completed(outcomes) = result else {
            panic!("script batches complete");
        };
        let CaseOutcome::Failure { error, .. } = &outcomes[0] else {
            panic!("syntax error expected");
        };
        assert_eq!(error.stage, Stage::Compile);
        assert_eq!(error.kind, ErrorKind::SyntaxError);
        assert!(scratch_is_empty(tmp.path()));
    }

    #[tokio::test]
    #[ignore] // Requires node
    async fn test_js_infinite_loop() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = Engine::new(EngineConfig::with_root(tmp.path()));

        let result = engine
            .execute("while (true) {}", Language::JavaScript, &[TestCase::new("t1", "")])
            .await;

        let RunResult::Completed(outcomes) = result else {
            panic!("script batches complete");
        };
        let CaseOutcome::Failure { error, .. } = &outcomes[0] else {
            panic!("timeout expected");
        };
        assert_eq!(error.kind, ErrorKind::TimeLimitExceeded);
        assert_eq!(error.message, ">2000ms");
    }
}
