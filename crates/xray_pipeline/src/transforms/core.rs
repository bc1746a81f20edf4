use anyhow::{Context, Result};
use std::marker::PhantomData;

/// One preprocessing step: turns an `I` into an `O`.
///
/// Implementations are shared between loader workers, hence `Send + Sync`.
/// Steps known at compile time are chained with [`Transform::then`]; steps read
/// from a JSON definition are boxed and run in order by
/// [`super::ImagePipeline`].
///
/// ```ignore
/// let to_input = CenterCrop::square(224)?.then(ToTensor);
/// let tensor = to_input.apply(xray)?; // [3, 224, 224]
/// ```
pub trait Transform<I, O>: Send + Sync {
    fn apply(&self, input: I) -> Result<O>;

    /// Runs `next` on the output of `self`.
    #[inline]
    fn then<T, M>(self, next: T) -> Chain<Self, T, O>
    where
        Self: Sized,
        T: Transform<O, M>,
        O: Send,
        M: Send,
    {
        Chain::new(self, next)
    }
}

impl<I, O, T> Transform<I, O> for Box<T>
where
    T: Transform<I, O> + ?Sized,
{
    fn apply(&self, input: I) -> Result<O> {
        (**self).apply(input)
    }
}

/// `first` followed by `second`, with `M` the value passed between them.
#[derive(Debug)]
pub struct Chain<A, B, M> {
    first: A,
    second: B,
    _intermediate: PhantomData<fn() -> M>,
}

impl<A, B, M> Chain<A, B, M> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            _intermediate: PhantomData,
        }
    }
}

impl<I, M, O, A, B> Transform<I, O> for Chain<A, B, M>
where
    A: Transform<I, M>,
    B: Transform<M, O>,
    M: Send,
{
    fn apply(&self, input: I) -> Result<O> {
        let intermediate = self
            .first
            .apply(input)
            .with_context(|| format!("Step {} failed", short_type_name::<A>()))?;
        self.second
            .apply(intermediate)
            .with_context(|| format!("Step {} failed", short_type_name::<B>()))
    }
}

/// Type name without its module path (`CenterCrop` rather than
/// `xray_pipeline::transforms::vision::geometric::CenterCrop`).
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct AddOne;
    impl Transform<u8, u8> for AddOne {
        fn apply(&self, input: u8) -> Result<u8> {
            input.checked_add(1).context("pixel overflow")
        }
    }

    struct ToUnit;
    impl Transform<u8, f32> for ToUnit {
        fn apply(&self, input: u8) -> Result<f32> {
            Ok(input as f32 / 255.0)
        }
    }

    #[test]
    fn test_then_feeds_output_forward() -> Result<()> {
        let pipeline = AddOne.then(AddOne).then(ToUnit);
        assert_eq!(pipeline.apply(253)?, 1.0);
        Ok(())
    }

    #[test]
    fn test_boxed_steps() -> Result<()> {
        let steps: Vec<Box<dyn Transform<u8, u8>>> = vec![Box::new(AddOne), Box::new(AddOne)];
        let value = steps.iter().try_fold(0u8, |value, step| step.apply(value))?;
        assert_eq!(value, 2);
        Ok(())
    }

    #[test]
    fn test_failing_step_is_named() {
        struct Reject;
        impl Transform<f32, f32> for Reject {
            fn apply(&self, _: f32) -> Result<f32> {
                bail!("corrupt pixel")
            }
        }

        let err = AddOne.then(AddOne).apply(255).unwrap_err();
        assert_eq!(err.to_string(), "Step AddOne failed");

        let err = ToUnit.then(Reject).apply(3).unwrap_err();
        assert_eq!(err.to_string(), "Step Reject failed");
        assert_eq!(err.root_cause().to_string(), "corrupt pixel");
    }
}
