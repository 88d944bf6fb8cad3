use crate::models::MediaItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupField {
    #[default]
    Category,
    Folder,
}

impl GroupField {
    /// Bucket for items with no (or a blank) label.
    pub fn fallback_label(self) -> &'static str {
        match self {
            Self::Category => "Uncategorized",
            Self::Folder => "Others",
        }
    }

    pub fn label_of(self, item: &MediaItem) -> &str {
        let value = match self {
            Self::Category => item.category.as_deref(),
            Self::Folder => item.folder.as_deref(),
        };
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(self.fallback_label())
    }
}

impl std::str::FromStr for GroupField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "category" => Ok(Self::Category),
            "folder" => Ok(Self::Folder),
            _ => Err(()),
        }
    }
}

/// Groups in order of first appearance; items keep their list order.
/// Nothing is computed until iterated and every `iter()` starts over.
#[derive(Debug, Clone, Copy)]
pub struct Grouping<'a> {
    items: &'a [MediaItem],
    field: GroupField,
}

pub fn group_by(items: &[MediaItem], field: GroupField) -> Grouping<'_> {
    Grouping { items, field }
}

impl<'a> Grouping<'a> {
    pub fn iter(&self) -> Groups<'a> {
        Groups {
            items: self.items,
            field: self.field,
            cursor: 0,
            seen: Vec::new(),
        }
    }

    pub fn field(&self) -> GroupField {
        self.field
    }
}

impl<'a> IntoIterator for Grouping<'a> {
    type Item = MediaGroup<'a>;
    type IntoIter = Groups<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &Grouping<'a> {
    type Item = MediaGroup<'a>;
    type IntoIter = Groups<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaGroup<'a> {
    pub label: &'a str,
    pub items: Vec<&'a MediaItem>,
}

pub struct Groups<'a> {
    items: &'a [MediaItem],
    field: GroupField,
    cursor: usize,
    seen: Vec<&'a str>,
}

impl<'a> Iterator for Groups<'a> {
    type Item = MediaGroup<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let all: &'a [MediaItem] = self.items;
        let field = self.field;
        while self.cursor < all.len() {
            let start = self.cursor;
            let label = field.label_of(&all[start]);
            self.cursor += 1;
            if self.seen.contains(&label) {
                continue;
            }
            self.seen.push(label);

            let items = all[start..]
                .iter()
                .filter(|item| field.label_of(item) == label)
                .collect();
            return Some(MediaGroup { label, items });
        }
        None
    }
}
