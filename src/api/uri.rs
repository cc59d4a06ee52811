use crate::instance::MemberAddress;

/// `mongodb://host1:port1,host2:port2/[db_name]?replicaSet=<name>`, members in pool order.
pub(crate) fn build_connection_uri(members: &[MemberAddress], set_name: &str, db_name: Option<&str>) -> String {
    let hosts: Vec<String> = members.iter().map(MemberAddress::to_string).collect();

    format!(
        "mongodb://{}/{}?replicaSet={}",
        hosts.join(","),
        db_name.unwrap_or(""),
        set_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_member_without_db_name() {
        let members = vec![MemberAddress::new("127.0.0.1", 27017)];
        assert_eq!(
            build_connection_uri(&members, "testset", None),
            "mongodb://127.0.0.1:27017/?replicaSet=testset"
        );
    }

    #[test]
    fn members_keep_pool_order() {
        let members = vec![
            MemberAddress::new("127.0.0.1", 40002),
            MemberAddress::new("127.0.0.1", 40000),
            MemberAddress::new("localhost", 40001),
        ];
        assert_eq!(
            build_connection_uri(&members, "rs0", Some("customDb")),
            "mongodb://127.0.0.1:40002,127.0.0.1:40000,localhost:40001/customDb?replicaSet=rs0"
        );
    }
}
