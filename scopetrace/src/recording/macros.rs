//! Instrumentation macros for the global recorder
//!
//! Each expansion owns a `static` that caches the call site's descriptor id,
//! so registration happens once per call site.

/// Record the rest of the enclosing scope as a block
///
/// ```
/// fn parse() {
///     scopetrace::scope_block!("parse");
///     // ...
/// }
/// ```
#[macro_export]
macro_rules! scope_block {
    ($name:expr) => {
        $crate::scope_block!($name, $crate::descriptor::DEFAULT_COLOR)
    };
    ($name:expr, $color:expr) => {
        let _scopetrace_guard = {
            static SITE: ::std::sync::OnceLock<
                ::core::option::Option<$crate::domain::DescriptorId>,
            > = ::std::sync::OnceLock::new();
            let recorder = $crate::Recorder::global();
            let site = *SITE.get_or_init(|| {
                recorder.register(
                    $crate::DescriptorSpec::new($name, file!(), line!()).color($color),
                )
            });
            match site {
                ::core::option::Option::Some(id) => recorder.scope(id),
                ::core::option::Option::None => $crate::BlockGuard::disarmed(recorder),
            }
        };
    };
}

/// Record an instant event
///
/// An optional second argument overrides the name of this instance.
#[macro_export]
macro_rules! scope_event {
    ($name:expr) => {{
        static SITE: ::std::sync::OnceLock<::core::option::Option<$crate::domain::DescriptorId>> =
            ::std::sync::OnceLock::new();
        let recorder = $crate::Recorder::global();
        let site = *SITE.get_or_init(|| {
            recorder.register($crate::DescriptorSpec::new($name, file!(), line!()).event())
        });
        if let ::core::option::Option::Some(id) = site {
            recorder.event(id);
        }
    }};
    ($name:expr, $instance:expr) => {{
        static SITE: ::std::sync::OnceLock<::core::option::Option<$crate::domain::DescriptorId>> =
            ::std::sync::OnceLock::new();
        let recorder = $crate::Recorder::global();
        let site = *SITE.get_or_init(|| {
            recorder.register($crate::DescriptorSpec::new($name, file!(), line!()).event())
        });
        if let ::core::option::Option::Some(id) = site {
            recorder.event_named(id, $instance);
        }
    }};
}
