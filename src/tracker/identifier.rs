//! 标识符与可跟踪对象 / Identifiers and trackable objects

use std::fmt::Debug;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;

mod sealed {
    pub trait Sealed {}

    impl Sealed for String {}
    impl Sealed for i64 {}
    impl Sealed for u64 {}
}

/// 标识符：封闭集合（`String`、`i64`、`u64`），每个跟踪器只用一种
/// Identifier: closed set (`String`, `i64`, `u64`), one kind per tracker
///
/// 只用于相等/成员判断，截断按位置而非按值
/// Used for equality/membership only; truncation is by position, never by value
pub trait Identifier:
    sealed::Sealed + Clone + Eq + Hash + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl Identifier for String {}
impl Identifier for i64 {}
impl Identifier for u64 {}

/// 可跟踪对象：暴露单个标识符 / Trackable object exposing a single identifier
///
/// ```
/// use s3_objects_tracker::Trackable;
///
/// struct Post {
///     id: u64,
///     title: String,
/// }
///
/// impl Trackable for Post {
///     type Id = u64;
///
///     fn id(&self) -> &u64 {
///         &self.id
///     }
/// }
/// ```
pub trait Trackable {
    type Id: Identifier;

    fn id(&self) -> &Self::Id;
}

impl<T: Trackable + ?Sized> Trackable for &T {
    type Id = T::Id;

    fn id(&self) -> &Self::Id {
        (**self).id()
    }
}
