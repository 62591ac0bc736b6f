/// Unwraps the error of a `Result`, panicking with the `Ok` value otherwise.
///
/// With a second argument, also asserts the error kind through the named
/// predicate: `assert_err!(session.flush(), is_stale_state)`.
#[macro_export]
macro_rules! assert_err {
    ($e:expr) => {
        match $e {
            Err(err) => err,
            Ok(value) => panic!("expected `Err`; actual=Ok({:?})", value),
        }
    };
    ($e:expr, $kind:ident) => {{
        let err = $crate::assert_err!($e);
        assert!(
            err.$kind(),
            "expected an error satisfying `{}`; actual={:?}",
            stringify!($kind),
            err
        );
        err
    }};
}

/// Unwraps the value of a `Result`, panicking with the error otherwise.
#[macro_export]
macro_rules! assert_ok {
    ($e:expr) => {
        match $e {
            Ok(value) => value,
            Err(err) => panic!("expected `Ok`; actual=Err({:?})", err),
        }
    };
}

/// Unwraps a `Result<Option<T>>` that must hold a value.
#[macro_export]
macro_rules! assert_some {
    ($e:expr) => {
        match $crate::assert_ok!($e) {
            Some(value) => value,
            None => panic!("expected `Some`; actual=None"),
        }
    };
}

/// Asserts a `Result<Option<T>>` holds no value.
#[macro_export]
macro_rules! assert_none {
    ($e:expr) => {
        if let Some(value) = $crate::assert_ok!($e) {
            panic!("expected `None`; actual=Some({:?})", value);
        }
    };
}
