//! Chain-length statistics for tuning hash functions and load factors.

use crate::dict::Dict;
use crate::dict_type::DictType;
use core::fmt;

/// Histogram buckets; the last one also counts every longer chain.
pub const STATS_VECTLEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    /// 0 for the live table, 1 for the rehash target.
    pub table: usize,
    pub size: usize,
    pub used: usize,
    /// Non-empty buckets.
    pub slots: usize,
    pub max_chain_len: usize,
    /// Sum of all chain lengths; equals `used` for a consistent table.
    pub total_chain_len: usize,
    pub chain_len_histogram: [usize; STATS_VECTLEN],
}

impl TableStats {
    pub fn avg_chain_len_counted(&self) -> f64 {
        if self.slots == 0 {
            0.0
        } else {
            self.total_chain_len as f64 / self.slots as f64
        }
    }

    pub fn avg_chain_len_computed(&self) -> f64 {
        if self.slots == 0 {
            0.0
        } else {
            self.used as f64 / self.slots as f64
        }
    }
}

impl fmt::Display for TableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.used == 0 {
            return writeln!(f, "No stats available for empty dictionaries");
        }
        let role = if self.table == 0 {
            "main hash table"
        } else {
            "rehashing target"
        };
        writeln!(f, "Hash table {} stats ({role}):", self.table)?;
        writeln!(f, " table size: {}", self.size)?;
        writeln!(f, " number of elements: {}", self.used)?;
        writeln!(f, " different slots: {}", self.slots)?;
        writeln!(f, " max chain length: {}", self.max_chain_len)?;
        writeln!(
            f,
            " avg chain length (counted): {:.2}",
            self.avg_chain_len_counted()
        )?;
        writeln!(
            f,
            " avg chain length (computed): {:.2}",
            self.avg_chain_len_computed()
        )?;
        writeln!(f, " Chain length distribution:")?;
        for (len, &count) in self.chain_len_histogram.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let pct = count as f64 * 100.0 / self.size as f64;
            let more = if len == STATS_VECTLEN - 1 { ">= " } else { "" };
            writeln!(f, "   {more}{len}: {count} ({pct:.2}%)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub tables: Vec<TableStats>,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in &self.tables {
            fmt::Display::fmt(t, f)?;
        }
        Ok(())
    }
}

impl<T: DictType> Dict<T> {
    fn table_stats(&self, table: usize) -> TableStats {
        let t = &self.ht[table];
        let mut stats = TableStats {
            table,
            size: t.size(),
            used: t.used,
            slots: 0,
            max_chain_len: 0,
            total_chain_len: 0,
            chain_len_histogram: [0; STATS_VECTLEN],
        };
        for &head in &t.buckets {
            let mut len = 0;
            let mut cur = head;
            while let Some(k) = cur {
                len += 1;
                cur = self.entries[k].next;
            }
            stats.chain_len_histogram[len.min(STATS_VECTLEN - 1)] += 1;
            if len > 0 {
                stats.slots += 1;
            }
            stats.max_chain_len = stats.max_chain_len.max(len);
            stats.total_chain_len += len;
        }
        stats
    }

    /// Per-table chain statistics; the rehash target is included only while
    /// a rehash is running.
    pub fn stats(&self) -> Stats {
        let mut tables = vec![self.table_stats(0)];
        if self.is_rehashing() {
            tables.push(self.table_stats(1));
        }
        Stats { tables }
    }
}
