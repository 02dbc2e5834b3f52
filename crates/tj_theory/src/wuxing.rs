//! 五行生克

use serde::{Deserialize, Serialize};

/// 五行，按相生顺序排列 (木生火生土生金生水生木)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    Wood,
    Fire,
    Earth,
    Metal,
    Water,
}

/// 甲方对乙方的生克关系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    /// 比和
    Same,
    /// 甲生乙
    Generates,
    /// 乙生甲
    GeneratedBy,
    /// 甲克乙
    Overcomes,
    /// 乙克甲
    OvercomeBy,
}

impl Element {
    pub const ALL: [Element; 5] = [
        Element::Wood,
        Element::Fire,
        Element::Earth,
        Element::Metal,
        Element::Water,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Element {
        Self::ALL[index % 5]
    }

    pub fn label(self) -> &'static str {
        match self {
            Element::Wood => "木",
            Element::Fire => "火",
            Element::Earth => "土",
            Element::Metal => "金",
            Element::Water => "水",
        }
    }

    /// 我生者
    pub fn generates(self) -> Element {
        Self::from_index(self.index() + 1)
    }

    /// 生我者
    pub fn generated_by(self) -> Element {
        Self::from_index(self.index() + 4)
    }

    /// 我克者
    pub fn overcomes(self) -> Element {
        Self::from_index(self.index() + 2)
    }

    pub fn relation(self, other: Element) -> Relation {
        if self == other {
            Relation::Same
        } else if self.generates() == other {
            Relation::Generates
        } else if other.generates() == self {
            Relation::GeneratedBy
        } else if self.overcomes() == other {
            Relation::Overcomes
        } else {
            Relation::OvercomeBy
        }
    }
}

impl Relation {
    pub fn label(self) -> &'static str {
        match self {
            Relation::Same => "比和",
            Relation::Generates => "相生(我生)",
            Relation::GeneratedBy => "相生(生我)",
            Relation::Overcomes => "相克(我克)",
            Relation::OvercomeBy => "相克(克我)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycles() {
        assert_eq!(Element::Wood.generates(), Element::Fire);
        assert_eq!(Element::Water.generates(), Element::Wood);
        assert_eq!(Element::Wood.overcomes(), Element::Earth);
        assert_eq!(Element::Metal.overcomes(), Element::Wood);
        assert_eq!(Element::Water.overcomes(), Element::Fire);
        assert_eq!(Element::Wood.generated_by(), Element::Water);
    }

    #[test]
    fn test_relation_is_total() {
        for a in Element::ALL {
            let relations: Vec<Relation> = Element::ALL.iter().map(|b| a.relation(*b)).collect();
            assert_eq!(relations.iter().filter(|r| **r == Relation::Same).count(), 1);
            assert_eq!(relations.iter().filter(|r| **r == Relation::OvercomeBy).count(), 1);
        }
        assert_eq!(Element::Fire.relation(Element::Metal), Relation::Overcomes);
        assert_eq!(Element::Fire.relation(Element::Water), Relation::OvercomeBy);
        assert_eq!(Element::Fire.relation(Element::Wood), Relation::GeneratedBy);
    }
}
