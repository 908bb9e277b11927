//! Function-call checking.
//!
//! For each call the checker walks: resolve signature → check arity →
//! instantiate row variables (if polymorphic) → check arguments →
//! validate options → emit the typed call node. Any failure
//! short-circuits the call with its accumulated errors.

use super::{Checker, TypeEnvironment};
use crate::ast::{CallOptions, Expression, QualifiedName, Span};
use crate::error::{CompileError, CompileWarning};
use crate::registry::FunctionSignature;
use crate::typed::{TypedCallOptions, TypedExpression};
use crate::types::{
    rows::{unify, Substitution},
    subtype::is_subtype,
    Type,
};

impl Checker {
    pub(crate) fn check_call(
        &mut self,
        env: &TypeEnvironment<'_>,
        name: &QualifiedName,
        args: &[Expression],
        options: &CallOptions,
        span: Span,
    ) -> Result<TypedExpression, Vec<CompileError>> {
        // Resolve
        let signature = env
            .registry()
            .lookup_in_scope(name, env.scope(), span)
            .map_err(|e| vec![e])?;

        // Arity
        if args.len() != signature.arity() {
            return Err(vec![CompileError::TypeError {
                message: format!(
                    "{} expects {} argument(s), got {}",
                    signature.qualified_name(),
                    signature.arity(),
                    args.len()
                ),
                span: Some(span),
            }]);
        }

        // Arguments; the two paths differ in who drives the types
        let (typed_args, return_type) = if signature.is_row_polymorphic() {
            self.check_args_polymorphic(env, &signature, args)?
        } else {
            let typed = self.check_args_monomorphic(env, &signature, args)?;
            (typed, signature.return_type.clone())
        };

        // Options
        let typed_options = self.validate_options(env, options, &signature.return_type, span)?;

        Ok(TypedExpression::FunctionCall {
            signature,
            args: typed_args,
            options: typed_options,
            ty: return_type,
            span,
        })
    }

    /// Monomorphic path: check every argument against its parameter type,
    /// so lambdas inherit parameter types from the signature. Errors from
    /// independent arguments accumulate.
    fn check_args_monomorphic(
        &mut self,
        env: &TypeEnvironment<'_>,
        signature: &FunctionSignature,
        args: &[Expression],
    ) -> Result<Vec<TypedExpression>, Vec<CompileError>> {
        let mut typed = Vec::with_capacity(args.len());
        let mut errors = Vec::new();
        for (arg, (_, param_ty)) in args.iter().zip(&signature.params) {
            match self.check_expr(env, arg, param_ty) {
                Ok(t) => typed.push(t),
                Err(e) => errors.extend(e),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(typed)
    }

    /// Row-polymorphic path: instantiate fresh row variables, infer the
    /// arguments, unify each against its parameter, and apply the
    /// collected substitution to the return type.
    fn check_args_polymorphic(
        &mut self,
        env: &TypeEnvironment<'_>,
        signature: &FunctionSignature,
        args: &[Expression],
    ) -> Result<(Vec<TypedExpression>, Type), Vec<CompileError>> {
        let instantiated = signature.instantiate(&mut self.rows);

        let mut typed = Vec::with_capacity(args.len());
        let mut errors = Vec::new();
        for arg in args {
            match self.infer(env, arg) {
                Ok(t) => typed.push(t),
                Err(e) => errors.extend(e),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut subst = Substitution::new();
        for (typed_arg, (param_name, param_ty)) in typed.iter().zip(&instantiated.params) {
            let arg_subst =
                unify(&typed_arg.ty(), param_ty, &mut self.rows).map_err(|reason| {
                    vec![CompileError::TypeError {
                        message: format!(
                            "argument '{param_name}' of {}: {reason}",
                            instantiated.qualified_name()
                        ),
                        span: Some(typed_arg.span()),
                    }]
                })?;
            subst.compose(arg_subst).map_err(|reason| {
                vec![CompileError::TypeError {
                    message: format!(
                        "arguments of {} do not agree: {reason}",
                        instantiated.qualified_name()
                    ),
                    span: Some(typed_arg.span()),
                }]
            })?;
        }

        Ok((typed, subst.apply(&instantiated.return_type)))
    }

    /// Validate call options: the fallback must be assignable to the
    /// return type, counts and durations must be in range, and
    /// inter-option dependencies produce warnings (never errors).
    fn validate_options(
        &mut self,
        env: &TypeEnvironment<'_>,
        options: &CallOptions,
        return_type: &Type,
        span: Span,
    ) -> Result<TypedCallOptions, Vec<CompileError>> {
        let mut errors = Vec::new();

        let fallback = match &options.fallback {
            Some(expr) => match self.infer(env, expr) {
                Ok(typed) => {
                    let got = typed.ty();
                    if !is_subtype(&got, return_type) {
                        errors.push(CompileError::FallbackTypeMismatch {
                            expected: return_type.to_string(),
                            got: got.to_string(),
                            span: Some(expr.span()),
                        });
                        None
                    } else {
                        Some(Box::new(typed))
                    }
                }
                Err(e) => {
                    errors.extend(e);
                    None
                }
            },
            None => None,
        };

        if let Some(retry) = options.retry {
            if retry < 0 {
                errors.push(invalid_option("retry", retry, "must be non-negative", span));
            } else if retry > 10 {
                self.warnings.push(CompileWarning::HighRetryCount {
                    value: retry,
                    span: Some(span),
                });
            }
        }
        if let Some(concurrency) = options.concurrency {
            if concurrency < 1 {
                errors.push(invalid_option(
                    "concurrency",
                    concurrency,
                    "must be positive",
                    span,
                ));
            }
        }
        if let Some(throttle) = options.throttle {
            if throttle.count < 1 {
                errors.push(invalid_option(
                    "throttle",
                    throttle.count,
                    "count must be positive",
                    span,
                ));
            }
            if throttle.window.value <= 0 {
                errors.push(invalid_option(
                    "throttle",
                    throttle.window.value,
                    "window must be a positive duration",
                    span,
                ));
            }
        }
        for (option, duration) in [
            ("timeout", options.timeout),
            ("delay", options.delay),
            ("cache", options.cache),
        ] {
            if let Some(duration) = duration {
                if duration.value <= 0 {
                    errors.push(invalid_option(
                        option,
                        duration.value,
                        "must be a positive duration",
                        span,
                    ));
                }
            }
        }

        // Inter-option dependencies are advisory only
        if options.delay.is_some() && options.retry.is_none() {
            self.warnings.push(CompileWarning::OptionDependency {
                option: "delay".to_string(),
                required: "retry".to_string(),
                span: Some(span),
            });
        }
        if options.backoff.is_some() && options.delay.is_none() && options.retry.is_none() {
            self.warnings.push(CompileWarning::OptionDependency {
                option: "backoff".to_string(),
                required: "retry or delay".to_string(),
                span: Some(span),
            });
        }
        if options.cache_backend.is_some() && options.cache.is_none() {
            self.warnings.push(CompileWarning::OptionDependency {
                option: "cache_backend".to_string(),
                required: "cache".to_string(),
                span: Some(span),
            });
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(TypedCallOptions {
            fallback,
            retry: options.retry,
            concurrency: options.concurrency,
            throttle: options.throttle,
            timeout: options.timeout,
            delay: options.delay,
            cache: options.cache,
            backoff: options.backoff,
            cache_backend: options.cache_backend.clone(),
        })
    }

    /// Merge-operator typing:
    ///
    /// - `Record + Record` unions the fields, right side winning
    /// - `List<Record> + List<Record>` merges element-wise
    /// - `List<Record> + Record` (and symmetrically) broadcasts the
    ///   record over the list
    pub(crate) fn merge_types(
        &mut self,
        left: &Type,
        right: &Type,
        span: Span,
    ) -> Result<Type, CompileError> {
        let incompatible = || CompileError::IncompatibleMerge {
            left: left.to_string(),
            right: right.to_string(),
            span: Some(span),
        };
        match (left, right) {
            (Type::Record(a), Type::Record(b)) => {
                let mut merged = a.clone();
                for (name, ty) in b {
                    merged.insert(name.clone(), ty.clone());
                }
                Ok(Type::Record(merged))
            }
            (Type::List(a), Type::List(b)) => {
                let element = self
                    .merge_types(a, b, span)
                    .map_err(|_| incompatible())?;
                Ok(Type::list(element))
            }
            (Type::List(element), Type::Record(_)) => {
                let merged = self
                    .merge_types(element, right, span)
                    .map_err(|_| incompatible())?;
                Ok(Type::list(merged))
            }
            (Type::Record(_), Type::List(element)) => {
                let merged = self
                    .merge_types(left, element, span)
                    .map_err(|_| incompatible())?;
                Ok(Type::list(merged))
            }
            _ => Err(incompatible()),
        }
    }

    /// Resolve an operator builtin (`add`, `eq-int`, `lt`, ...) by simple
    /// name, preferring an unnamespaced registration, otherwise the first
    /// qualified one in sorted order.
    pub(crate) fn lookup_builtin(
        &self,
        env: &TypeEnvironment<'_>,
        name: &str,
    ) -> Option<FunctionSignature> {
        let mut sigs = env.registry().lookup_simple(name);
        sigs.sort_by_key(FunctionSignature::qualified_name);
        sigs.iter()
            .find(|sig| sig.namespace.is_none())
            .cloned()
            .or_else(|| sigs.into_iter().next())
    }
}

fn invalid_option(option: &str, value: i64, constraint: &str, span: Span) -> CompileError {
    CompileError::InvalidOptionValue {
        option: option.to_string(),
        value: value.to_string(),
        constraint: constraint.to_string(),
        span: Some(span),
    }
}
