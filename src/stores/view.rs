use crate::models::torrent::{Torrent, TorrentStatus};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Snapshot of every torrent, keyed by daemon id
pub type TorrentMap = BTreeMap<i64, Arc<Torrent>>;

/// Client-side filter; all set predicates must hold
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    /// Raw status equality
    pub status: Option<TorrentStatus>,
    /// Case-insensitive substring of the name; empty matches everything
    pub text: Option<String>,
    /// Torrent must carry at least one of these labels
    pub labels: Vec<String>,
}

impl Filter {
    pub fn matches(&self, torrent: &Torrent) -> bool {
        if let Some(status) = self.status {
            if torrent.status != status {
                return false;
            }
        }

        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            if !torrent.name.to_lowercase().contains(&text.to_lowercase()) {
                return false;
            }
        }

        if !self.labels.is_empty() && !self.labels.iter().any(|label| torrent.labels.contains(label)) {
            return false;
        }

        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Name,
    Status,
    Progress,
    Size,
    DownloadSpeed,
    UploadSpeed,
    Eta,
    QueuePosition,
    AddedDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Clicking the active column flips direction, another column starts ascending
    pub fn toggle(&mut self, field: SortField) {
        if self.field == field {
            self.direction = match self.direction {
                SortDirection::Ascending => SortDirection::Descending,
                SortDirection::Descending => SortDirection::Ascending,
            };
        } else {
            self.field = field;
            self.direction = SortDirection::Ascending;
        }
    }

    fn compare(&self, a: &Torrent, b: &Torrent) -> Ordering {
        let ordering = match self.field {
            SortField::Name => a
                .name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name)),
            SortField::Status => a.status.cmp(&b.status),
            SortField::Progress => a.percent_done.total_cmp(&b.percent_done),
            SortField::Size => a.total_size.cmp(&b.total_size),
            SortField::DownloadSpeed => a.rate_download.cmp(&b.rate_download),
            SortField::UploadSpeed => a.rate_upload.cmp(&b.rate_upload),
            SortField::Eta => a.eta_sort_key().total_cmp(&b.eta_sort_key()),
            SortField::QueuePosition => a.queue_position.cmp(&b.queue_position),
            SortField::AddedDate => a.added_date.cmp(&b.added_date),
        };

        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Filter then stably sort the snapshot into display order
pub fn project(torrents: &TorrentMap, filter: &Filter, sort: &SortSpec) -> Vec<Arc<Torrent>> {
    let mut view: Vec<Arc<Torrent>> = torrents
        .values()
        .filter(|torrent| filter.matches(torrent))
        .cloned()
        .collect();

    sort_torrents(&mut view, sort);
    view
}

pub fn sort_torrents(torrents: &mut [Arc<Torrent>], sort: &SortSpec) {
    torrents.sort_by(|a, b| sort.compare(a, b));
}

/// Number of torrents per raw status
pub fn status_counts(torrents: &TorrentMap) -> BTreeMap<TorrentStatus, usize> {
    let mut counts = BTreeMap::new();
    for torrent in torrents.values() {
        *counts.entry(torrent.status).or_insert(0) += 1;
    }
    counts
}

/// Every label in use, sorted and deduplicated
pub fn all_labels(torrents: &TorrentMap) -> Vec<String> {
    let mut labels: Vec<String> = torrents
        .values()
        .flat_map(|torrent| torrent.labels.iter().cloned())
        .collect();
    labels.sort();
    labels.dedup();
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn torrent(id: i64, name: &str, status: TorrentStatus, labels: &[&str]) -> Torrent {
        Torrent {
            id,
            name: name.to_string(),
            status,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            ..Torrent::default()
        }
    }

    fn map(torrents: Vec<Torrent>) -> TorrentMap {
        torrents.into_iter().map(|t| (t.id, Arc::new(t))).collect()
    }

    fn ids(view: &[Arc<Torrent>]) -> Vec<i64> {
        view.iter().map(|t| t.id).collect()
    }

    #[test]
    fn test_filter_conjunction() {
        let torrents = map(vec![
            torrent(1, "Foo", TorrentStatus::Downloading, &["x"]),
            torrent(2, "Bar", TorrentStatus::Seeding, &["y"]),
        ]);
        let filter = Filter {
            status: Some(TorrentStatus::Downloading),
            text: Some("oo".to_string()),
            labels: Vec::new(),
        };

        let view = project(&torrents, &filter, &SortSpec::default());
        assert_eq!(ids(&view), vec![1]);
    }

    #[test]
    fn test_text_filter_is_case_insensitive() {
        let torrents = map(vec![
            torrent(1, "Ubuntu Server", TorrentStatus::Seeding, &[]),
            torrent(2, "debian", TorrentStatus::Seeding, &[]),
        ]);
        let filter = Filter {
            text: Some("UBUNTU".to_string()),
            ..Filter::default()
        };
        assert_eq!(ids(&project(&torrents, &filter, &SortSpec::default())), vec![1]);

        let empty = Filter {
            text: Some(String::new()),
            ..Filter::default()
        };
        assert_eq!(project(&torrents, &empty, &SortSpec::default()).len(), 2);
    }

    #[test]
    fn test_label_filter_is_any_of() {
        let torrents = map(vec![
            torrent(1, "a", TorrentStatus::Seeding, &["movies"]),
            torrent(2, "b", TorrentStatus::Seeding, &["linux", "iso"]),
            torrent(3, "c", TorrentStatus::Seeding, &[]),
        ]);
        let filter = Filter {
            labels: vec!["iso".to_string(), "movies".to_string()],
            ..Filter::default()
        };
        assert_eq!(ids(&project(&torrents, &filter, &SortSpec::default())), vec![1, 2]);
    }

    #[test]
    fn test_eta_ascending_puts_unknown_last() {
        let torrents = map(vec![
            Torrent { id: 1, eta: -1, ..Torrent::default() },
            Torrent { id: 2, eta: 30, ..Torrent::default() },
            Torrent { id: 3, eta: 10, ..Torrent::default() },
        ]);

        let asc = SortSpec::new(SortField::Eta, SortDirection::Ascending);
        let etas: Vec<i64> = project(&torrents, &Filter::default(), &asc)
            .iter()
            .map(|t| t.eta)
            .collect();
        assert_eq!(etas, vec![10, 30, -1]);

        let desc = SortSpec::new(SortField::Eta, SortDirection::Descending);
        let etas: Vec<i64> = project(&torrents, &Filter::default(), &desc)
            .iter()
            .map(|t| t.eta)
            .collect();
        assert_eq!(etas, vec![-1, 30, 10]);
    }

    #[test]
    fn test_sort_is_stable() {
        let torrents = map(vec![
            Torrent { id: 1, total_size: 5, ..Torrent::default() },
            Torrent { id: 2, total_size: 1, ..Torrent::default() },
            Torrent { id: 3, total_size: 5, ..Torrent::default() },
        ]);
        let desc = SortSpec::new(SortField::Size, SortDirection::Descending);
        assert_eq!(ids(&project(&torrents, &Filter::default(), &desc)), vec![1, 3, 2]);
    }

    #[test]
    fn test_sort_by_name() {
        let torrents = map(vec![
            torrent(1, "zeta", TorrentStatus::Seeding, &[]),
            torrent(2, "Alpha", TorrentStatus::Seeding, &[]),
            torrent(3, "beta", TorrentStatus::Seeding, &[]),
        ]);
        assert_eq!(ids(&project(&torrents, &Filter::default(), &SortSpec::default())), vec![2, 3, 1]);
    }

    #[test]
    fn test_toggle_sort() {
        let mut sort = SortSpec::default();
        sort.toggle(SortField::Name);
        assert_eq!(sort.direction, SortDirection::Descending);
        sort.toggle(SortField::Eta);
        assert_eq!(sort, SortSpec::new(SortField::Eta, SortDirection::Ascending));
    }

    #[test]
    fn test_status_counts_and_labels() {
        let torrents = map(vec![
            torrent(1, "a", TorrentStatus::Seeding, &["b", "a"]),
            torrent(2, "b", TorrentStatus::Seeding, &["a"]),
            torrent(3, "c", TorrentStatus::Stopped, &[]),
        ]);
        let counts = status_counts(&torrents);
        assert_eq!(counts.get(&TorrentStatus::Seeding), Some(&2));
        assert_eq!(counts.get(&TorrentStatus::Stopped), Some(&1));
        assert_eq!(all_labels(&torrents), vec!["a", "b"]);
    }
}
