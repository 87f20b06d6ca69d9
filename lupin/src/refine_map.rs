use crate::error::ensure_consistent;

/// Merge groups from one level to the next coarser level.
///
/// Each group lists the fine nodes absorbed into one coarse node, the
/// survivor first. Groups are padded with empty cells up to the widest
/// group so the whole assignment is a fixed-width table. Fine nodes
/// missing from every group pass through as singletons.
#[derive(Debug, Clone)]
pub struct CoarsenAssignment {
    n_fine: usize,
    width: usize,
    table: Vec<Option<usize>>,
}

/// Padding value used by the integer (flat table) representation
pub const SENTINEL: i64 = -1;

impl CoarsenAssignment {
    /// * `n_fine` - number of nodes at the finer level
    /// * `groups` - jagged merge groups, survivor first
    pub fn from_groups(n_fine: usize, groups: &[Vec<usize>]) -> anyhow::Result<Self> {
        let width = groups.iter().map(|g| g.len()).max().unwrap_or(1).max(1);

        let mut seen = vec![false; n_fine];
        let mut table = Vec::with_capacity(groups.len() * width);

        for (g, members) in groups.iter().enumerate() {
            ensure_consistent!(!members.is_empty(), "merge group {} is empty", g);
            for &i in members {
                ensure_consistent!(
                    i < n_fine,
                    "merge group {} refers to node {} of a level with {} nodes",
                    g,
                    i,
                    n_fine
                );
                ensure_consistent!(!seen[i], "node {} appears in more than one merge group", i);
                seen[i] = true;
            }
            table.extend(members.iter().map(|&i| Some(i)));
            table.extend(std::iter::repeat_n(None, width - members.len()));
        }

        Ok(Self {
            n_fine,
            width,
            table,
        })
    }

    /// Build from rows padded with [`SENTINEL`], e.g. `[[0, 1, 2], [4, 5, -1]]`
    pub fn from_padded_rows(n_fine: usize, rows: &[Vec<i64>]) -> anyhow::Result<Self> {
        let mut groups = Vec::with_capacity(rows.len());
        for (g, row) in rows.iter().enumerate() {
            let mut members = vec![];
            for &x in row {
                if x == SENTINEL {
                    continue;
                }
                ensure_consistent!(x >= 0, "merge group {} has a negative index {}", g, x);
                members.push(x as usize);
            }
            groups.push(members);
        }
        Self::from_groups(n_fine, &groups)
    }

    pub fn n_fine(&self) -> usize {
        self.n_fine
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn n_groups(&self) -> usize {
        self.table.len() / self.width
    }

    /// non-empty cells of the `g`-th group, survivor first
    pub fn group(&self, g: usize) -> impl Iterator<Item = usize> + '_ {
        self.table[(g * self.width)..((g + 1) * self.width)]
            .iter()
            .filter_map(|&x| x)
    }

    /// Number of coarse nodes: every fine node except the absorbed ones
    pub fn n_coarse(&self) -> usize {
        let absorbed: usize = (0..self.n_groups())
            .map(|g| self.group(g).count() - 1)
            .sum();
        self.n_fine - absorbed
    }
}

/// Inverse of a [`CoarsenAssignment`]: coarse node `k` expands to the
/// fine nodes it represents, survivor first.
///
/// Coarse nodes are numbered by the ascending order of the fine nodes
/// that survive the merge.
#[derive(Debug, Clone)]
pub struct RefineMap {
    n_fine: usize,
    width: usize,
    table: Vec<Option<usize>>,
}

impl RefineMap {
    pub fn from_assignment(assignment: &CoarsenAssignment) -> Self {
        let n_fine = assignment.n_fine();
        let width = assignment.width();

        let mut absorbed = vec![false; n_fine];
        let mut group_of_survivor = vec![None; n_fine];

        for g in 0..assignment.n_groups() {
            let mut members = assignment.group(g);
            if let Some(s) = members.next() {
                group_of_survivor[s] = Some(g);
            }
            for i in members {
                absorbed[i] = true;
            }
        }

        let mut table = vec![];
        for i in (0..n_fine).filter(|&i| !absorbed[i]) {
            let row_start = table.len();
            match group_of_survivor[i] {
                Some(g) => table.extend(assignment.group(g).map(Some)),
                None => table.push(Some(i)),
            }
            table.resize(row_start + width, None);
        }

        Self {
            n_fine,
            width,
            table,
        }
    }

    /// Number of nodes at the coarser level
    pub fn n_coarse(&self) -> usize {
        self.table.len() / self.width
    }

    /// Number of nodes at the finer level
    pub fn n_fine(&self) -> usize {
        self.n_fine
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// padded row of `coarse`
    pub fn row(&self, coarse: usize) -> &[Option<usize>] {
        &self.table[(coarse * self.width)..((coarse + 1) * self.width)]
    }

    /// fine nodes under `coarse`, survivor first
    pub fn expand(&self, coarse: usize) -> impl Iterator<Item = usize> + '_ {
        self.row(coarse).iter().filter_map(|&x| x)
    }

    pub fn group_size(&self, coarse: usize) -> usize {
        self.expand(coarse).count()
    }

    /// Coarse index of each fine node
    pub fn coarse_labels(&self) -> Vec<usize> {
        let mut labels = vec![0; self.n_fine];
        for k in 0..self.n_coarse() {
            for i in self.expand(k) {
                labels[i] = k;
            }
        }
        labels
    }

    /// Union of the expansions of `nodes`, sorted
    pub fn refine_nodes(&self, nodes: &[usize]) -> anyhow::Result<Vec<usize>> {
        let mut ret = Vec::with_capacity(nodes.len() * self.width);
        for &k in nodes {
            ensure_consistent!(
                k < self.n_coarse(),
                "node {} out of {} coarse nodes",
                k,
                self.n_coarse()
            );
            ret.extend(self.expand(k));
        }
        ret.sort_unstable();
        ret.dedup();
        Ok(ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 8 -> 4: {0,1,2}, {3}, {4,5}, {6,7}
    fn eight_to_four() -> anyhow::Result<CoarsenAssignment> {
        CoarsenAssignment::from_groups(8, &[vec![0, 1, 2], vec![4, 5], vec![6, 7]])
    }

    #[test]
    fn jagged_groups_are_padded() -> anyhow::Result<()> {
        let a = eight_to_four()?;
        assert_eq!(a.width(), 3);
        assert_eq!(a.n_groups(), 3);
        assert_eq!(a.group(1).collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(a.n_coarse(), 4);

        let b = CoarsenAssignment::from_padded_rows(8, &[vec![0, 1, 2], vec![4, 5, -1]])?;
        assert_eq!(b.group(1).collect::<Vec<_>>(), vec![4, 5]);
        Ok(())
    }

    #[test]
    fn unmentioned_nodes_pass_through() -> anyhow::Result<()> {
        let r = RefineMap::from_assignment(&eight_to_four()?);
        assert_eq!(r.n_coarse(), 4);
        assert_eq!(r.expand(0).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(r.expand(1).collect::<Vec<_>>(), vec![3]);
        assert_eq!(r.row(1), &[Some(3), None, None]);
        assert_eq!(r.expand(2).collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(r.expand(3).collect::<Vec<_>>(), vec![6, 7]);
        Ok(())
    }

    #[test]
    fn refine_map_partitions_the_fine_level() -> anyhow::Result<()> {
        let a = CoarsenAssignment::from_groups(10, &[vec![7, 2], vec![5, 9, 0]])?;
        let r = RefineMap::from_assignment(&a);
        assert_eq!(r.n_coarse(), a.n_coarse());

        let mut hits = vec![0; 10];
        for k in 0..r.n_coarse() {
            for i in r.expand(k) {
                hits[i] += 1;
            }
        }
        assert!(hits.iter().all(|&h| h == 1));

        // survivors 1, 3, 4, 5, 6, 7, 8 in ascending order
        assert_eq!(r.expand(3).collect::<Vec<_>>(), vec![5, 9, 0]);
        assert_eq!(r.expand(5).collect::<Vec<_>>(), vec![7, 2]);

        let labels = r.coarse_labels();
        assert_eq!(labels[9], 3);
        assert_eq!(labels[2], 5);
        Ok(())
    }

    #[test]
    fn malformed_groups_are_rejected() {
        assert!(CoarsenAssignment::from_groups(4, &[vec![0, 1], vec![1, 2]]).is_err());
        assert!(CoarsenAssignment::from_groups(4, &[vec![0, 4]]).is_err());
        assert!(CoarsenAssignment::from_groups(4, &[vec![]]).is_err());
        assert!(CoarsenAssignment::from_padded_rows(4, &[vec![0, -3]]).is_err());
    }

    #[test]
    fn refine_nodes_drops_padding() -> anyhow::Result<()> {
        let r = RefineMap::from_assignment(&eight_to_four()?);
        assert_eq!(r.refine_nodes(&[1, 0])?, vec![0, 1, 2, 3]);
        assert!(r.refine_nodes(&[4]).is_err());
        Ok(())
    }
}
