mod index;
mod property;
