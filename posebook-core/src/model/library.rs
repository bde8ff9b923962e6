use serde::{Deserialize, Serialize};

use super::{MoveDirection, PoseBook, clamp_index, index_after_removal, move_item};
use crate::error::{PoseLibError, Result};
use crate::naming::{RenameOutcome, Renamer, resolve_name_collision};

/// Default name for books created without one
pub const DEFAULT_BOOK_NAME: &str = "New Book";

#[derive(Clone, Default, Serialize, Deserialize)]
struct PoseLibraryData {
    #[serde(default)]
    books: Vec<PoseBook>,
    #[serde(default)]
    active_book_index: Option<usize>,
}

/// Root container of books for one skeleton
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "PoseLibraryData", into = "PoseLibraryData")]
pub struct PoseLibrary {
    books: Vec<PoseBook>,
    active_book_index: Option<usize>,
}

impl From<PoseLibraryData> for PoseLibrary {
    fn from(data: PoseLibraryData) -> Self {
        let mut library = PoseLibrary::new();
        for book in data.books {
            library.push_book(book);
        }
        library.active_book_index = clamp_index(data.active_book_index, library.books.len());
        library
    }
}

impl From<PoseLibrary> for PoseLibraryData {
    fn from(library: PoseLibrary) -> Self {
        PoseLibraryData {
            books: library.books,
            active_book_index: library.active_book_index,
        }
    }
}

impl PoseLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    pub fn books(&self) -> &[PoseBook] {
        &self.books
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn book(&self, index: usize) -> Option<&PoseBook> {
        self.books.get(index)
    }

    pub fn book_mut(&mut self, index: usize) -> Option<&mut PoseBook> {
        self.books.get_mut(index)
    }

    pub fn position_of_book(&self, name: &str) -> Option<usize> {
        self.books.iter().position(|b| b.name() == name)
    }

    pub fn book_by_name(&self, name: &str) -> Option<&PoseBook> {
        self.books.iter().find(|b| b.name() == name)
    }

    pub fn book_by_name_mut(&mut self, name: &str) -> Option<&mut PoseBook> {
        self.books.iter_mut().find(|b| b.name() == name)
    }

    pub fn active_book_index(&self) -> Option<usize> {
        self.active_book_index
    }

    /// Select a book; out-of-range input is clamped
    pub fn set_active_book_index(&mut self, index: Option<usize>) {
        self.active_book_index = clamp_index(index, self.books.len());
    }

    pub fn active_book(&self) -> Option<&PoseBook> {
        self.active_book_index.and_then(|i| self.books.get(i))
    }

    pub fn active_book_mut(&mut self) -> Option<&mut PoseBook> {
        self.active_book_index.and_then(|i| self.books.get_mut(i))
    }

    fn active_index_or_err(&self) -> Result<usize> {
        self.active_book_index
            .filter(|&i| i < self.books.len())
            .ok_or(PoseLibError::NoActiveBook)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.books.len() {
            Ok(())
        } else {
            Err(PoseLibError::InvalidIndex {
                kind: "book",
                index,
                len: self.books.len(),
            })
        }
    }

    // ------------------------------------------------------------------------
    // Books
    // ------------------------------------------------------------------------

    /// Create an empty book (default name `New Book`); it becomes active
    pub fn add_book(&mut self, name: Option<&str>) -> usize {
        self.push_book(PoseBook::new(name.unwrap_or(DEFAULT_BOOK_NAME)))
    }

    /// Append an existing book, resolving its name; it becomes active
    pub fn push_book(&mut self, mut book: PoseBook) -> usize {
        let name = resolve_name_collision(book.name(), self.books.iter().map(|b| b.name()));
        book.set_name(name);
        self.books.push(book);
        let index = self.books.len() - 1;
        self.active_book_index = Some(index);
        index
    }

    pub fn remove_book(&mut self, index: usize) -> Result<PoseBook> {
        self.check_index(index)?;
        let book = self.books.remove(index);
        self.active_book_index = index_after_removal(self.active_book_index, index, self.books.len());
        Ok(book)
    }

    pub fn remove_active_book(&mut self) -> Result<PoseBook> {
        let index = self.active_index_or_err()?;
        self.remove_book(index)
    }

    /// Rename the book at `index`; returns the name actually assigned
    pub fn rename_book(&mut self, index: usize, name: &str) -> Result<String> {
        self.check_index(index)?;
        let siblings = self
            .books
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, b)| b.name());
        let resolved = resolve_name_collision(name, siblings);
        self.books[index].set_name(resolved.clone());
        Ok(resolved)
    }

    /// Move the active book; returns its new index
    pub fn move_book(&mut self, direction: MoveDirection) -> Result<usize> {
        let index = self.active_index_or_err()?;
        let target = move_item(&mut self.books, index, direction);
        self.active_book_index = Some(target);
        Ok(target)
    }

    /// Copy the active book as `<name> - Copy`; the copy becomes active
    pub fn duplicate_active_book(&mut self) -> Result<usize> {
        let index = self.active_index_or_err()?;
        let source = &self.books[index];
        let mut copy = PoseBook::new(format!("{} - Copy", source.name()));
        copy.copy_from(source);
        Ok(self.push_book(copy))
    }

    /// Index of a target book distinct from `source`
    fn target_index(&self, source: usize, target_name: &str) -> Result<usize> {
        let target = self
            .position_of_book(target_name)
            .ok_or_else(|| PoseLibError::BookNotFound(target_name.to_string()))?;
        if target == source {
            return Err(PoseLibError::SameBook);
        }
        Ok(target)
    }

    /// Append copies of every pose of the active book to `target_name`,
    /// then remove the active book unless `copy` is set
    pub fn merge_active_book(&mut self, target_name: &str, copy: bool) -> Result<()> {
        let source = self.active_index_or_err()?;
        let target = self.target_index(source, target_name)?;

        let poses: Vec<_> = self.books[source].poses().iter().map(|p| p.duplicate()).collect();
        let count = poses.len();
        for pose in poses {
            self.books[target].add_pose(pose);
        }
        if !copy {
            self.remove_book(source)?;
        }
        tracing::info!("Merged {} poses into '{}'", count, target_name);
        Ok(())
    }

    /// Move (or copy) the active pose of the active book into `target_name`
    pub fn move_active_pose_to_book(&mut self, target_name: &str, copy: bool) -> Result<()> {
        let source = self.active_index_or_err()?;
        let target = self.target_index(source, target_name)?;

        let pose_index = self.books[source]
            .active_pose_index()
            .ok_or(PoseLibError::NoActivePose)?;
        let pose = if copy {
            self.books[source]
                .pose(pose_index)
                .map(|p| p.duplicate())
                .ok_or(PoseLibError::NoActivePose)?
        } else {
            self.books[source].remove_pose(pose_index)?
        };
        self.books[target].add_pose(pose);
        Ok(())
    }

    /// Replace contents with a copy of `other`
    pub fn copy_from(&mut self, other: &PoseLibrary) {
        self.books.clear();
        for book in &other.books {
            let mut copy = PoseBook::new(book.name());
            copy.copy_from(book);
            self.push_book(copy);
        }
        self.active_book_index = clamp_index(other.active_book_index, self.books.len());
    }

    // ------------------------------------------------------------------------
    // Batch rename
    // ------------------------------------------------------------------------

    fn target_books(&mut self, all_books: bool) -> Result<&mut [PoseBook]> {
        if all_books {
            Ok(&mut self.books)
        } else {
            let index = self.active_index_or_err()?;
            Ok(std::slice::from_mut(&mut self.books[index]))
        }
    }

    /// Rename poses in the active book, or in every book
    pub fn rename_poses(&mut self, renamer: &Renamer, all_books: bool) -> Result<Vec<RenameOutcome>> {
        let mut outcomes = Vec::new();
        for book in self.target_books(all_books)? {
            outcomes.extend(book.rename_poses(renamer)?);
        }
        Ok(outcomes)
    }

    /// Rename bone entries in the active book, or in every book
    pub fn rename_bones(&mut self, renamer: &Renamer, all_books: bool) -> Result<Vec<RenameOutcome>> {
        Ok(self
            .target_books(all_books)?
            .iter_mut()
            .flat_map(|book| book.rename_bones(renamer))
            .collect())
    }
}
