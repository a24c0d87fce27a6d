// Fri Oct 16 2026 - Alex

use crate::engine::task::TaskError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between the engine and a running
/// compute function.
///
/// Cloning is cheap and every clone observes the same flag. A token created
/// with [`CancellationToken::child`] also reports cancelled once any of its
/// ancestors is, so one parent can stop a whole batch of tasks.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

#[derive(Debug, Default)]
struct TokenInner {
    cancelled: AtomicBool,
    parent: Option<Arc<TokenInner>>,
}

impl TokenInner {
    fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return true;
        }

        let mut current = self.parent.as_ref();
        while let Some(node) = current {
            if node.cancelled.load(Ordering::Acquire) {
                return true;
            }
            current = node.parent.as_ref();
        }

        false
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token that is cancelled whenever `self` is.
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                parent: Some(self.inner.clone()),
            }),
        }
    }

    /// Idempotent. Returns `true` only for the call that flipped the flag.
    pub fn cancel(&self) -> bool {
        !self.inner.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Early-return helper for compute functions: `token.check()?;`
    pub fn check(&self) -> Result<(), TaskError> {
        if self.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn same_token(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_clones_share_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();

        let handle = thread::spawn(move || {
            clone.cancel();
        });
        handle.join().unwrap();

        assert!(token.is_cancelled());
        assert!(token.same_token(&token.clone()));
    }

    #[test]
    fn test_child_follows_parent() {
        let root = CancellationToken::new();
        let child = root.child();
        let grandchild = child.child();

        assert!(!grandchild.is_cancelled());
        root.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn test_child_cancel_does_not_touch_parent() {
        let root = CancellationToken::new();
        let child = root.child();
        child.cancel();

        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[test]
    fn test_check() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(matches!(token.check(), Err(TaskError::Cancelled)));
    }
}
