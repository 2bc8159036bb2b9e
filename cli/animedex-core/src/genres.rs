use std::cmp::Ordering;

use animedex_catalog::{Genre, RecordId};

/// The genres available for filtering, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenreTaxonomy {
    genres: Vec<Genre>,
}

impl GenreTaxonomy {
    pub fn from_genres(mut genres: Vec<Genre>) -> Self {
        genres.sort_by(compare_names);
        Self { genres }
    }

    pub fn genres(&self) -> &[Genre] {
        &self.genres
    }

    pub fn get(&self, id: RecordId) -> Option<&Genre> {
        self.genres.iter().find(|genre| genre.mal_id == id)
    }

    /// Look up a genre by name, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<&Genre> {
        let name = name.to_lowercase();
        self.genres
            .iter()
            .find(|genre| genre.name.to_lowercase() == name)
    }
}

/// Case-insensitive, with a byte-wise tie-break to keep the order total.
fn compare_names(a: &Genre, b: &Genre) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}
