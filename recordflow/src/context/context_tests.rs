//! Tests for the execution context.

#[cfg(test)]
mod tests {
    use crate::checkpoint::CheckpointManager;
    use crate::context::ExecutionContext;
    use crate::core::StageAttempt;
    use crate::errors::PipelineError;
    use serde_json::json;

    #[test]
    fn test_new_context_is_seeded_with_records() {
        let ctx = ExecutionContext::new(vec![json!({"v": 1}), json!({"v": 2})]);

        assert_eq!(ctx.record_count(), 2);
        assert!(ctx.errors.is_empty());
        assert!(ctx.warnings.is_empty());
        assert!(ctx.stage_results.is_empty());
        assert!(ctx.attempts.is_empty());
        assert!(!ctx.run_id.is_nil());
    }

    #[test]
    fn test_each_context_gets_its_own_run_id() {
        let a = ExecutionContext::new(Vec::new());
        let b = ExecutionContext::new(Vec::new());
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn test_record_error_keeps_kind() {
        let mut ctx = ExecutionContext::new(Vec::new());
        ctx.record_error("load", &PipelineError::unsatisfied("load", "fetch"));

        assert_eq!(ctx.errors.len(), 1);
        assert_eq!(ctx.errors[0].stage, "load");
        assert_eq!(ctx.errors[0].kind, "UnsatisfiedDependencyError");
    }

    #[test]
    fn test_record_warning() {
        let mut ctx = ExecutionContext::new(Vec::new());
        ctx.record_warning(Some("load"), "slow source");
        ctx.record_warning(None, "empty pipeline");

        assert_eq!(ctx.warnings[0].stage.as_deref(), Some("load"));
        assert!(ctx.warnings[1].stage.is_none());
    }

    #[test]
    fn test_stage_result_lookup() {
        let mut ctx = ExecutionContext::new(Vec::new());
        ctx.stage_results.insert("validate".to_string(), json!({"kept": 3}));

        assert!(ctx.has_result("validate"));
        assert!(!ctx.has_result("transform"));
        assert_eq!(ctx.stage_result("validate"), Some(&json!({"kept": 3})));
    }

    #[test]
    fn test_attempts_for_filters_by_stage() {
        let mut ctx = ExecutionContext::new(Vec::new());
        ctx.attempts.push(StageAttempt::start("a", 1));
        ctx.attempts.push(StageAttempt::start("b", 1));
        ctx.attempts.push(StageAttempt::start("a", 2));

        let attempts = ctx.attempts_for("a");
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[1].attempt, 2);
    }

    #[test]
    fn test_resume_from_checkpoint() {
        let mut source = ExecutionContext::new(Vec::new());
        source.stage_results.insert("validate".to_string(), json!(true));

        let mut manager = CheckpointManager::new(1000, 10);
        let checkpoint = manager.create_checkpoint(&source, 1000);

        let resumed = ExecutionContext::resume_from(vec![json!(1)], &checkpoint);
        assert!(resumed.has_result("validate"));
        assert_eq!(resumed.record_count(), 1);
        assert_eq!(resumed.metadata.get("resumed_from"), Some(&json!(checkpoint.id)));
    }

    #[test]
    fn test_context_serialization() {
        let ctx = ExecutionContext::new(vec![json!({"v": 1})]).with_metadata("source", json!("csv"));
        let json = serde_json::to_string(&ctx).unwrap();
        let restored: ExecutionContext = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.run_id, ctx.run_id);
        assert_eq!(restored.records, ctx.records);
        assert_eq!(restored.metadata.get("source"), Some(&json!("csv")));
    }
}
