pub mod member;
pub mod recipe;
pub mod collection;
pub mod tag;
pub mod comment;

pub use member::Member;
pub use recipe::{Category, Ingredient, Recipe, RecipeIngredient};
pub use collection::{CollectionEntry, CollectionName, UnknownCollection};
pub use tag::Tag;
pub use comment::{Comment, Rating};
