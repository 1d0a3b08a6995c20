use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// First year a film could have been made (Roundhay Garden Scene).
pub const MIN_YEAR: i32 = 1888;
pub const MIN_RATING: f32 = 0.0;
pub const MAX_RATING: f32 = 10.0;

/// Upper bound for the year field: announced-for-next-year titles are fine.
pub fn max_year() -> i32 {
    Utc::now().year() + 1
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Movie {
    pub name: String,
    pub description: String,
    pub year: i32,
    pub genres: Vec<String>,
    pub rating: Option<f32>,
    /// Non-owning reference; stays `None` if the creator is ever removed.
    pub created_by: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Movie {
    /// Range checks enforced again at write time, independent of form
    /// validation.
    pub fn check_constraints(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty");
        }
        if self.description.trim().is_empty() {
            return Err("description must not be empty");
        }
        if self.year < MIN_YEAR || self.year > max_year() {
            return Err("year out of range");
        }
        if let Some(rating) = self.rating {
            if !(MIN_RATING..=MAX_RATING).contains(&rating) {
                return Err("rating out of range");
            }
        }
        Ok(())
    }
}

/// Raw movie form input, kept as strings so a rejected submission can be
/// re-rendered exactly as the user entered it.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct MovieForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub genres: String,
    #[serde(default)]
    pub rating: String,
}

/// A validated movie submission.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieFields {
    pub name: String,
    pub description: String,
    pub year: i32,
    pub genres: Vec<String>,
    pub rating: Option<f32>,
}

impl MovieForm {
    pub fn validate(&self) -> Result<MovieFields, Vec<String>> {
        let mut errors = Vec::new();

        let name = self.name.trim().to_owned();
        if name.is_empty() {
            errors.push("Name is required".to_owned());
        }

        let description = self.description.trim().to_owned();
        if description.is_empty() {
            errors.push("Description is required".to_owned());
        }

        let year = match self.year.trim().parse::<i32>() {
            Ok(year) if year >= MIN_YEAR && year <= max_year() => year,
            _ => {
                errors.push("Year is invalid".to_owned());
                0
            }
        };

        // Rating is optional; an empty field means "no rating".
        let rating_input = self.rating.trim();
        let rating = if rating_input.is_empty() {
            None
        } else {
            match rating_input.parse::<f32>() {
                Ok(rating) if (MIN_RATING..=MAX_RATING).contains(&rating) => Some(rating),
                _ => {
                    errors.push("Rating must be between 0 and 10".to_owned());
                    None
                }
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(MovieFields {
            name,
            description,
            year,
            genres: split_genres(&self.genres),
            rating,
        })
    }

    /// Prefill for the edit form.
    pub fn from_movie(movie: &Movie) -> MovieForm {
        MovieForm {
            name: movie.name.clone(),
            description: movie.description.clone(),
            year: movie.year.to_string(),
            genres: movie.genres.join(", "),
            rating: movie.rating.map(|r| r.to_string()).unwrap_or_default(),
        }
    }
}

impl MovieFields {
    pub fn into_movie(self, created_by: Option<u64>, now: DateTime<Utc>) -> Movie {
        Movie {
            name: self.name,
            description: self.description,
            year: self.year,
            genres: self.genres,
            rating: self.rating,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Partial update: owner and creation time are untouched.
    pub fn apply_to(self, movie: &mut Movie, now: DateTime<Utc>) {
        movie.name = self.name;
        movie.description = self.description;
        movie.year = self.year;
        movie.genres = self.genres;
        movie.rating = self.rating;
        movie.updated_at = now;
    }
}

fn split_genres(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|genre| !genre.is_empty())
        .map(str::to_owned)
        .collect()
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.username.trim().is_empty() {
            errors.push("Username is required".to_owned());
        }
        if !valid_email(self.email.trim()) {
            errors.push("Valid email required".to_owned());
        }
        if self.password.chars().count() < 6 {
            errors.push("Password must be at least 6 characters".to_owned());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn valid_email(email: &str) -> bool {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
