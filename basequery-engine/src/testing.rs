//! Shared schema for unit tests.

use crate::relations::{EntityMetadata, JoinTableMeta, RelationMeta, Schema};

/// Payments owned by employees, who are people in departments.
pub(crate) fn payroll_schema() -> Schema {
    Schema::new()
        .with_entity(
            EntityMetadata::new("Payment", "payments")
                .columns(["id", "amount", "reference", "status", "employeeId", "createdAt", "deletedAt"])
                .soft_delete("deletedAt")
                .relation(RelationMeta::many_to_one("employee", "Employee").join_on("employeeId", "id"))
                .relation(
                    RelationMeta::many_to_many(
                        "tags",
                        "Tag",
                        JoinTableMeta {
                            table: "payment_tags".into(),
                            source_column: "paymentId".into(),
                            target_column: "tagId".into(),
                        },
                    )
                    .join_on("id", "id"),
                ),
        )
        .with_entity(
            EntityMetadata::new("Employee", "employees")
                .columns(["id", "role", "personId", "departmentId", "deletedAt"])
                .virtual_column("displayName")
                .soft_delete("deletedAt")
                .relation(RelationMeta::many_to_one("person", "Person").join_on("personId", "id"))
                .relation(RelationMeta::many_to_one("department", "Department").join_on("departmentId", "id"))
                .relation(RelationMeta::one_to_many("payments", "Payment").join_on("id", "employeeId")),
        )
        .with_entity(
            EntityMetadata::new("Person", "people")
                .columns(["id", "name", "email", "addressId"])
                .relation(RelationMeta::many_to_one("address", "Address").join_on("addressId", "id")),
        )
        .with_entity(EntityMetadata::new("Address", "addresses").columns(["id", "city"]))
        .with_entity(EntityMetadata::new("Department", "departments").columns(["id", "title"]))
        .with_entity(EntityMetadata::new("Tag", "tags").columns(["id", "label"]))
}
